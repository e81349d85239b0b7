use anyhow::Result;
use chromedriver_downloader::{
    catalog::{DEFAULT_URL, RecordFilter},
    commands::{self, Options},
    runtime::RealRuntime,
};
use clap::{Parser, ValueEnum, builder::RangedU64ValueParser};
use log::info;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

const ABOUT: &str = "\
ChromeDriver downloader

Queries the Chrome for Testing index of known good versions and lists or
downloads the matching ChromeDriver archives. Default index:
    https://googlechromelabs.github.io/chrome-for-testing/known-good-versions-with-downloads.json

(use --url to change it)

Endpoints and reference:
    https://github.com/GoogleChromeLabs/chrome-for-testing?tab=readme-ov-file#json-api-endpoints";

const EXAMPLES: &str = "\
Examples:
  List versions
    chromedriver_downloader -l
  List versions for platform win64 and version 124.*
    chromedriver_downloader -l -fp win64 -fv 124
  Download drivers for platform win64 and version 124.0.*
    chromedriver_downloader -d -fp win64 -fv 124.0";

/// Minimum log severity, selected by its initial.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    #[value(name = "I")]
    Info,
    #[value(name = "D")]
    Debug,
    #[value(name = "W")]
    Warning,
    #[value(name = "E")]
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "chromedriver_downloader",
    version = env!("CHROMEDRIVER_DOWNLOADER_VERSION"),
    about = ABOUT,
    after_help = EXAMPLES
)]
struct Cli {
    /// List available versions
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Save the fetched index to chromedriver_downloader.json when listing
    #[arg(short = 's', long = "save")]
    save: bool,

    /// Filter platforms (exact match), e.g. win64. Short form: -fp
    #[arg(long = "filter_platform", visible_alias = "filter-platform", value_name = "PLATFORM")]
    filter_platform: Option<String>,

    /// Filter versions (prefix match), e.g. 124.0.6334. Short form: -fv
    #[arg(long = "filter_version", visible_alias = "filter-version", value_name = "VERSION")]
    filter_version: Option<String>,

    /// Url of the release index
    #[arg(
        short = 'u',
        long = "url",
        env = "CHROMEDRIVER_DOWNLOADER_URL",
        default_value = DEFAULT_URL
    )]
    url: String,

    /// Download the versions selected with --filter_version
    #[arg(short = 'd', long = "download", requires = "filter_version")]
    download: bool,

    /// Log level: I(info), D(debug), W(warning), E(error)
    #[arg(short = 'L', long = "log_level", value_enum, default_value = "I")]
    log_level: LogLevel,

    /// Number of archives downloaded concurrently
    #[arg(
        short = 'j',
        long = "jobs",
        env = "CHROMEDRIVER_DOWNLOADER_JOBS",
        default_value_t = 1,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    jobs: usize,

    /// Extra attempts after a server or connection error
    #[arg(long = "retries", default_value_t = 0, value_name = "N")]
    retries: usize,

    /// Directory for downloaded archives and the saved index
    #[arg(short = 'o', long = "output-dir", value_name = "PATH")]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            url: Some(self.url.clone()),
            output_dir: self.output_dir.clone(),
            jobs: self.jobs,
            retries: self.retries,
        }
    }

    fn filter(&self) -> RecordFilter {
        RecordFilter::new(self.filter_platform.clone(), self.filter_version.clone())
    }
}

/// Rewrites the two-letter short flags `-fp` and `-fv` (also `-fp=VALUE`)
/// into their long forms, which clap can parse.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut after_terminator = false;
    args.into_iter()
        .map(|arg| {
            if after_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                after_terminator = true;
                return arg;
            }
            for (short, long) in [("-fp", "--filter_platform"), ("-fv", "--filter_version")] {
                if text == short {
                    return OsString::from(long);
                }
                if let Some(value) = text.strip_prefix(short).and_then(|v| v.strip_prefix('=')) {
                    return OsString::from(format!("{}={}", long, value));
                }
            }
            arg
        })
        .collect()
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_filter()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}: {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.log_level);
    info!("{:?}", cli);

    let runtime = RealRuntime;

    if cli.list {
        commands::list(runtime, cli.options(), cli.filter(), cli.save).await?;
    } else if let (true, Some(version)) = (cli.download, cli.filter_version.as_deref()) {
        commands::download(runtime, cli.options(), version, cli.filter_platform.as_deref())
            .await?;
    } else {
        info!("Missing options :-(");
    }
    Ok(())
}

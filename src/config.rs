use std::path::PathBuf;
use std::time::Duration;

use structopt::StructOpt;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "smtpd",
    about = "A minimal SMTP receiver that hands finished messages to a sink",
    author = "2026, Philippe TEMESI <https://www.tems.be>"
)]
pub struct Opt {
    /// Run as daemon
    #[structopt(short = "d", long = "daemon")]
    pub daemon: bool,

    /// PID file written in daemon mode
    #[structopt(long = "pid-file", parse(from_os_str), default_value = "/tmp/smtpd.pid")]
    pub pid_file: PathBuf,

    /// Listening ports (can be specified multiple times, default: 2525)
    #[structopt(short = "p", long = "port", default_value = "2525", number_of_values = 1)]
    pub ports: Vec<u16>,

    /// Listening address (default: 0.0.0.0)
    #[structopt(short = "a", long = "address", default_value = "0.0.0.0")]
    pub address: String,

    /// Name announced in the greeting and HELO reply (default: local hostname)
    #[structopt(long = "hostname")]
    pub hostname: Option<String>,

    /// Transcript file path
    #[structopt(long = "logs", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Directory to save received messages as .eml files
    #[structopt(long = "data", parse(from_os_str))]
    pub data_dir: Option<PathBuf>,

    /// Verbose mode - print the SMTP transcript to stdout
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Do not escape control characters in the transcript - DANGEROUS
    #[structopt(short = "r", long = "raw")]
    pub raw_display: bool,

    /// Banner delay in milliseconds (default: 0)
    #[structopt(long = "banner-delay", default_value = "0")]
    pub banner_delay: u64,

    /// Emit diagnostics as JSON
    #[structopt(long = "json")]
    pub json: bool,
}

impl Opt {
    pub fn banner_delay(&self) -> Duration {
        Duration::from_millis(self.banner_delay)
    }
}

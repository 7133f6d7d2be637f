use ping_probe::{GenericError, Session, SessionConfig, DEFAULT_PAYLOAD_SIZE};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(argh::FromArgs)]
/// ping - send ICMPv4 ECHO_REQUEST probes to a destination host
struct Args {
    /// turn on verbosity on the output
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// local IP address to bind the probing socket to
    #[argh(option, short = 's')]
    source: Option<Ipv4Addr>,

    /// number of probes to send
    #[argh(option, short = 'n', default = "3")]
    number: u16,

    /// per-probe timeout in seconds
    #[argh(option, short = 't', default = "2")]
    timeout: u64,

    /// destination IPv4 address
    #[argh(positional)]
    destination: Ipv4Addr,
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { Level::TRACE } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = SessionConfig::new(args.destination);
    config.count = args.number;
    config.probe_timeout = Duration::from_secs(args.timeout.max(1));
    config.source = args.source;

    println!("PING {} {} bytes of data:", args.destination, DEFAULT_PAYLOAD_SIZE);

    let handle = Session::start(config)?;
    for report in handle.reports() {
        println!("{report}");
    }
    let result = handle.wait()?;

    println!("**** {} Ping Statistics ****", args.destination);
    println!("{result}");
    Ok(())
}

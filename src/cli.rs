use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command};

use hifitime::prelude::Duration;

use gnss_module::{
    Error,
    device::NmeaMask,
    event::DataFormat,
    settings::{Board, Settings},
};

use std::str::FromStr;

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("gnss-module")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("GNSS positioning module controller")
                    .color(ColorChoice::Always)
                    .arg_required_else_help(true)
                    .next_help_heading("Receiver (recorded session)")
                    .arg(
                        Arg::new("file")
                            .long("file")
                            .short('f')
                            .value_name("FILENAME")
                            .action(ArgAction::Set)
                            .required(true)
                            .help("Recorded receiver session (JSON lines).
Gzip files are supported but they must be terminated with '.gz'"),
                    )
                    .next_help_heading("Modem (hardware toggles)")
                    .arg(
                        Arg::new("port")
                            .short('p')
                            .long("port")
                            .value_name("PORT")
                            .help("Modem AT command serial port. Example /dev/ttyACM0 on Linux.
When omitted, toggles are acknowledged locally (dry run)."),
                    )
                    .arg(
                        Arg::new("baudrate")
                            .short('b')
                            .long("baud")
                            .value_name("Baudrate (u32)")
                            .help("Define serial port baud rate. By default we use 115_200"),
                    )
                    .arg(
                        Arg::new("board")
                            .long("board")
                            .value_name("BOARD")
                            .help("Board profile: \"nrf9160dk\" (default), \"thingy91\" or \"generic\" (no toggle)"),
                    )
                    .next_help_heading("Receiver configuration")
                    .arg(
                        Arg::new("interval")
                            .long("interval")
                            .value_name("SECONDS")
                            .help("Fix interval in seconds. Default is 0 (single-shot)"),
                    )
                    .arg(
                        Arg::new("retry")
                            .long("retry")
                            .value_name("SECONDS")
                            .help("Fix retry timeout in seconds. Default is 60"),
                    )
                    .arg(
                        Arg::new("nmea")
                            .long("nmea")
                            .value_name("SENTENCES")
                            .help("Comma separated NMEA sentences. Default is \"GGA\""),
                    )
                    .next_help_heading("Publication")
                    .arg(
                        Arg::new("format")
                            .long("format")
                            .value_name("FORMAT")
                            .help("Position data format, either \"nmea\" (default) or \"pvt\""),
                    )
                    .arg(
                        Arg::new("queue")
                            .long("queue")
                            .value_name("CAPACITY")
                            .help("Output queue capacity. Default is 5"),
                    )
                    .next_help_heading("Application")
                    .arg(
                        Arg::new("requests")
                            .short('n')
                            .long("requests")
                            .value_name("COUNT")
                            .help("Number of position requests. Default is 1"),
                    )
                    .arg(
                        Arg::new("period")
                            .long("period")
                            .value_name("DURATION")
                            .help("Dead time between two position requests, for example \"30 s\". Default is 1 minute"),
                    )
                    .get_matches()
            },
        }
    }

    pub fn filepath(&self) -> Option<&String> {
        self.matches.get_one::<String>("file")
    }

    pub fn serial_port(&self) -> Option<&String> {
        self.matches.get_one::<String>("port")
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, Error>
    where
        T::Err: std::fmt::Display,
    {
        match self.matches.get_one::<String>(key) {
            Some(value) => T::from_str(value.trim())
                .map(Some)
                .map_err(|e| Error::Settings(format!("invalid --{}: {}", key, e))),
            None => Ok(None),
        }
    }

    pub fn baud_rate(&self) -> Result<u32, Error> {
        Ok(self.parse("baudrate")?.unwrap_or(115_200))
    }

    pub fn requests(&self) -> Result<usize, Error> {
        Ok(self.parse("requests")?.unwrap_or(1))
    }

    pub fn period(&self) -> Result<Duration, Error> {
        Ok(self
            .parse::<Duration>("period")?
            .unwrap_or(Duration::from_seconds(60.0)))
    }

    pub fn settings(&self) -> Result<Settings, Error> {
        let defaults = Settings::default();

        let settings = Settings {
            fix_interval: self.parse("interval")?.unwrap_or(defaults.fix_interval),
            fix_retry: self.parse("retry")?.unwrap_or(defaults.fix_retry),
            nmea_mask: self
                .parse::<NmeaMask>("nmea")?
                .unwrap_or(defaults.nmea_mask),
            format: self
                .parse::<DataFormat>("format")?
                .unwrap_or(defaults.format),
            queue_capacity: self.parse("queue")?.unwrap_or(defaults.queue_capacity),
            board: self.parse::<Board>("board")?.unwrap_or(defaults.board),
            ..defaults
        };

        settings.validate()?;
        Ok(settings)
    }
}

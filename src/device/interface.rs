use serialport::SerialPort;

use log::{debug, trace};

use std::{
    io::{ErrorKind, Read, Write},
    time::{Duration, Instant},
};

use super::{AtCommands, AtError};

/// Serial read timeout, converted to "no data" by [Interface::read_port]
const PORT_TIMEOUT: Duration = Duration::from_millis(250);

/// Maximal wait for a final result code
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// [Interface] to the modem AT command interpreter
pub enum Interface {
    /// [Interface::Loopback] acknowledges every command,
    /// for operation without hardware.
    Loopback,

    /// [Interface::Port] is used to reach a physical modem.
    Port(Box<dyn SerialPort>),
}

impl Interface {
    /// Opens a serial port [Interface]
    pub fn open_serial_port(port_str: &str, baud: u32) -> Result<Self, AtError> {
        let port = serialport::new(port_str, baud)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| AtError::Io(e.into()))?;

        debug!("AT interface opened on {} ({} bauds)", port_str, baud);
        Ok(Self::Port(port))
    }

    pub fn is_loopback(&self) -> bool {
        matches!(self, Self::Loopback)
    }

    /// Reads serial port, converting timeouts into "No Data Received".
    fn read_port(port: &mut Box<dyn SerialPort>, output: &mut [u8]) -> std::io::Result<usize> {
        match port.read(output) {
            Ok(b) => Ok(b),
            Err(e) => {
                if e.kind() == ErrorKind::TimedOut {
                    Ok(0)
                } else {
                    Err(e)
                }
            },
        }
    }

    /// Collects the response until a final result code shows up.
    fn wait_for_result(port: &mut Box<dyn SerialPort>) -> Result<(), AtError> {
        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        let mut buffer = [0; 256];
        let mut response = String::with_capacity(256);

        loop {
            let nbytes = Self::read_port(port, &mut buffer)?;
            response.push_str(&String::from_utf8_lossy(&buffer[..nbytes]));

            if let Some(result) = final_result(&response) {
                return result;
            }

            if Instant::now() > deadline {
                return Err(AtError::Timeout);
            }
        }
    }
}

/// Scans a modem response for its final result code.
/// Returns None while the response is incomplete.
pub fn final_result(response: &str) -> Option<Result<(), AtError>> {
    // last line may still be in flight
    let complete = match response.rfind('\n') {
        Some(end) => &response[..end],
        None => return None,
    };

    for line in complete.lines().map(str::trim) {
        if line == "OK" {
            return Some(Ok(()));
        }
        if line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") {
            return Some(Err(AtError::Rejected(line.to_string())));
        }
    }

    None
}

impl AtCommands for Interface {
    fn write(&mut self, command: &str) -> Result<(), AtError> {
        match self {
            Self::Loopback => {
                trace!("{} - acknowledged (loopback)", command);
                Ok(())
            },
            Self::Port(port) => {
                port.write_all(command.as_bytes())?;
                port.write_all(b"\r\n")?;
                port.flush()?;

                Self::wait_for_result(port)?;
                trace!("{} - OK", command);
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_final_result() {
        assert!(final_result("").is_none());
        assert!(final_result("AT%XCOEX0=1,1,1565,1586\r\n").is_none());
        assert!(final_result("OK").is_none());
        assert!(matches!(final_result("\r\nOK\r\n"), Some(Ok(()))));

        match final_result("\r\n+CME ERROR: 3\r\n") {
            Some(Err(AtError::Rejected(line))) => assert_eq!(line, "+CME ERROR: 3"),
            _ => panic!("expecting rejection"),
        }

        assert!(matches!(
            final_result("ERROR\r\n"),
            Some(Err(AtError::Rejected(_)))
        ));
    }

    #[test]
    fn test_loopback() {
        let mut interface = Interface::Loopback;
        assert!(interface.is_loopback());
        assert!(interface.write("AT%XMAGPIO=1,0,0,1,1,1574,1577").is_ok());
    }
}

use std::future::Future;
use btleplug::api::{BDAddr, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use log::info;
use tokio::time::{timeout, Duration};

use crate::device::constants::WRITE_DEADLINE;
use crate::error::DeviceError;

/// Something that can write raw bytes to the relay command characteristic.
pub trait CommandWriter {
    fn write_command(&self, bytes: &[u8]) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/// Commands are sent as plain UTF-8 without any framing.
pub fn encode_command(command: &str) -> Vec<u8> {
    command.as_bytes().to_vec()
}

pub async fn send_command<W: CommandWriter>(writer: &W, command: &str) -> Result<(), DeviceError> {
    if command.is_empty() {
        return Err(DeviceError::EmptyCommand);
    }

    writer.write_command(&encode_command(command)).await?;
    info!("Sent: {}", command);
    Ok(())
}

/// A connected relay board together with its resolved command characteristic.
#[derive(Debug, Clone)]
pub struct RelayLink {
    pub peripheral: Peripheral,
    pub characteristic: Characteristic,
    pub address: BDAddr,
}

impl CommandWriter for RelayLink {
    async fn write_command(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        let fut = self.peripheral.write(&self.characteristic, bytes, WriteType::WithResponse);

        match timeout(Duration::from_millis(WRITE_DEADLINE), fut).await {
            Err(_) => Err(DeviceError::WriteTimeout),
            Ok(result) => Ok(result?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl CommandWriter for RecordingWriter {
        async fn write_command(&self, bytes: &[u8]) -> Result<(), DeviceError> {
            self.writes.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    struct FailingWriter;

    impl CommandWriter for FailingWriter {
        async fn write_command(&self, _bytes: &[u8]) -> Result<(), DeviceError> {
            Err(DeviceError::WriteTimeout)
        }
    }

    #[tokio::test]
    async fn writes_exactly_the_utf8_bytes() {
        let writer = RecordingWriter::default();

        send_command(&writer, "1ON").await.unwrap();
        send_command(&writer, "relé 2 ✓").await.unwrap();

        let writes = writer.writes.lock().unwrap();
        assert_eq!(*writes, vec![b"1ON".to_vec(), "relé 2 ✓".as_bytes().to_vec()]);
    }

    #[tokio::test]
    async fn no_framing_is_added() {
        let writer = RecordingWriter::default();
        send_command(&writer, " ALL OFF\n").await.unwrap();
        assert_eq!(writer.writes.lock().unwrap()[0], b" ALL OFF\n".to_vec());
    }

    #[tokio::test]
    async fn empty_command_is_not_written() {
        let writer = RecordingWriter::default();
        assert!(matches!(send_command(&writer, "").await, Err(DeviceError::EmptyCommand)));
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_errors_are_propagated() {
        assert!(matches!(send_command(&FailingWriter, "1OFF").await, Err(DeviceError::WriteTimeout)));
    }
}

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, info};

use crate::tftp::config::SessionConfig;
use crate::tftp::error::Result;
use crate::tftp::reader::{ReadOutcome, TftpReader};
use crate::tftp::shared::STRIDE_SIZE;
use crate::tftp::writer::TftpWriter;

/// Downloads `filename` from `host` into `sink`, returning the byte count.
pub fn get_to<W: Write>(
    host: &str,
    filename: &str,
    config: SessionConfig,
    sink: &mut W,
) -> Result<usize> {
    let mut reader = TftpReader::with_config(host, filename, config);
    let copied = copy_blocks(&mut reader, sink)?;
    reader.close();

    debug!("Received [{}], {} bytes", filename, copied);
    Ok(copied)
}

/// Downloads `filename` from `host` and stores it at `local_path`.
///
/// The local file is only created once the server has answered with data,
/// so a refused request leaves nothing behind.
pub fn get(host: &str, filename: &str, local_path: &Path, config: SessionConfig) -> Result<usize> {
    info!("Downloading [{}] from {}", filename, host);
    let mut reader = TftpReader::with_config(host, filename, config);

    let mut buf = [0; STRIDE_SIZE];
    let first = reader.read_chunk(&mut buf)?;
    let mut fd = File::create(local_path)?;

    let mut bytes = 0;
    if let ReadOutcome::Bytes(len) = first {
        fd.write_all(&buf[..len])?;
        bytes += len;
    }
    bytes += copy_blocks(&mut reader, &mut fd)?;

    reader.close();
    info!("Download complete: {}", local_path.display());
    Ok(bytes)
}

/// Uploads everything `source` yields as `filename` on `host`.
pub fn put_from<R: Read>(
    host: &str,
    filename: &str,
    config: SessionConfig,
    source: &mut R,
) -> Result<usize> {
    let mut writer = TftpWriter::with_config(host, filename, config);

    let mut buf = [0; STRIDE_SIZE];
    loop {
        let len = source.read(&mut buf)?;
        if len == 0 {
            break;
        }
        writer.write_bytes(&buf[..len])?;
    }

    writer.close()?;
    Ok(writer.bytes_sent())
}

/// Uploads the file at `local_path` as `filename` on `host`.
pub fn put(host: &str, local_path: &Path, filename: &str, config: SessionConfig) -> Result<usize> {
    info!("Uploading {} to {} as [{}]", local_path.display(), host, filename);
    let mut fd = File::open(local_path)?;

    let bytes = put_from(host, filename, config, &mut fd)?;
    info!("Upload complete: {}", filename);
    Ok(bytes)
}

fn copy_blocks<W: Write>(reader: &mut TftpReader, sink: &mut W) -> Result<usize> {
    let mut buf = [0; STRIDE_SIZE];
    let mut bytes = 0;

    while let ReadOutcome::Bytes(len) = reader.read_chunk(&mut buf)? {
        sink.write_all(&buf[..len])?;
        bytes += len;
    }

    Ok(bytes)
}

//! Info command - query `INFO` from a running server over RESP.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use hyperkv_wire::{Decoder, Frame};

pub fn run(host: &str, port: u16, section: Option<&str>) -> Result<()> {
    let addr = format!("{host}:{port}");
    let mut stream = TcpStream::connect(&addr).with_context(|| format!("failed to connect to {addr}"))?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    let mut args = vec![Frame::bulk("INFO")];
    if let Some(section) = section {
        args.push(Frame::bulk(section.to_string()));
    }
    let command = Frame::array(args);
    stream.write_all(&command.encode()).context("failed to send INFO command")?;

    let decoder = Decoder::default();
    let mut buf = BytesMut::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(frame) = decoder.decode(&mut buf).context("malformed reply from server")? {
            match frame {
                Frame::BulkString(Some(body)) => {
                    print!("{}", String::from_utf8_lossy(&body));
                    return Ok(());
                }
                Frame::Error(msg) => bail!("server returned an error: {}", String::from_utf8_lossy(&msg)),
                other => bail!("unexpected reply to INFO: {other:?}"),
            }
        }
        let n = stream.read(&mut chunk).context("failed to read from server")?;
        if n == 0 {
            bail!("connection closed before a complete reply was received");
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

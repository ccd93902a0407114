use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str;
use std::time::Instant;
use log::{debug, trace};
use crate::data::{Addr, ConnectionRecord, Protocol, State};
use crate::error::{Error, Result};

pub const DEFAULT_ROOT: &str = "/proc";

/// Reads `<root>/<pid>/net/tcp`, the IPv4 TCP socket table of the
/// network namespace that `pid` lives in.
#[derive(Clone, Debug)]
pub struct TableReader {
    root: PathBuf,
}

impl TableReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("net").join("tcp")
    }

    pub fn read(&self, pid: u32) -> Result<Vec<ConnectionRecord>> {
        let start = Instant::now();
        let path  = self.path(pid);

        let file = File::open(&path).map_err(|source| {
            Error::TableUnreadable { path: path.clone(), source }
        })?;

        let mut records = Vec::new();
        let mut skipped = 0;

        for line in BufReader::new(file).split(b'\n').skip(1) {
            let line = line.map_err(|source| {
                Error::TableUnreadable { path: path.clone(), source }
            })?;

            let line = match str::from_utf8(&line) {
                Ok(line) => line,
                Err(e)   => {
                    trace!("{}: not utf-8: {}", path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            match parse_line(line) {
                Ok(r) if r.local_addr.is_loopback() && r.remote_addr.is_loopback() => {
                    skipped += 1;
                }
                Ok(r) => records.push(r),
                Err(e) => {
                    trace!("{}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        debug!("pid {}: parsed {} connections, skipped {} in {:?}",
               pid, records.len(), skipped, start.elapsed());

        Ok(records)
    }
}

/// Parses one data line of the table, e.g.
/// `0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 ...`.
pub fn parse_line(line: &str) -> Result<ConnectionRecord> {
    let fields = line.split_whitespace().collect::<Vec<_>>();

    let (local, remote, st) = match fields[..] {
        [_, local, remote, st, ..] => (local, remote, st),
        _ => return Err(Error::MalformedRecord(format!("too few fields: {:?}", line))),
    };

    let (local_addr, local_port)  = endpoint(local)?;
    let (remote_addr, remote_port) = endpoint(remote)?;
    let state = State::from_code(st);

    // listening sockets have no peer; report the bound port instead
    let remote_port = match state {
        State::Listen => local_port,
        _             => remote_port,
    };

    Ok(ConnectionRecord {
        protocol: Protocol::Tcp,
        local_addr,
        local_port,
        remote_addr,
        remote_port,
        state,
    })
}

fn endpoint(field: &str) -> Result<(Addr, u16)> {
    match field.split(':').collect::<Vec<_>>()[..] {
        [addr, port] => Ok((decode_addr(addr), decode_port(port))),
        _            => Err(Error::MalformedRecord(format!("bad endpoint: {:?}", field))),
    }
}

/// Decodes the kernel's host-order hex dump of an IPv4 address, so
/// `0100007F` is `127.0.0.1`.
pub fn decode_addr(hex: &str) -> Addr {
    if hex.len() != 8 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Addr::Unknown;
    }

    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        let pos = 6 - 2 * i;
        match u8::from_str_radix(&hex[pos..pos + 2], 16) {
            Ok(n)  => *octet = n,
            Err(_) => return Addr::Unknown,
        }
    }

    Addr::V4(Ipv4Addr::from(octets))
}

pub fn decode_port(hex: &str) -> u16 {
    u16::from_str_radix(hex, 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use super::*;

    const HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

    fn table(lines: &[&str]) -> (tempfile::TempDir, TableReader) {
        let root = tempfile::tempdir().unwrap();
        let dir  = root.path().join("4242").join("net");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tcp"), lines.join("\n")).unwrap();
        let reader = TableReader::new(root.path());
        (root, reader)
    }

    #[test]
    fn decodes_addresses() {
        assert_eq!(decode_addr("0100007F").to_string(), "127.0.0.1");
        assert_eq!(decode_addr("04030201").to_string(), "1.2.3.4");
        assert_eq!(decode_addr("00000000").to_string(), "0.0.0.0");
        assert_eq!(decode_addr("0100007").to_string(), "unknown");
        assert_eq!(decode_addr("0100007F00").to_string(), "unknown");
        assert_eq!(decode_addr("0100007G").to_string(), "unknown");
        assert_eq!(decode_addr("").to_string(), "unknown");
    }

    #[test]
    fn decodes_ports() {
        assert_eq!(decode_port("1F90"), 8080);
        assert_eq!(decode_port("01BB"), 443);
        assert_eq!(decode_port("0000"), 0);
        assert_eq!(decode_port("zz"), 0);
    }

    #[test]
    fn listen_reports_local_port() {
        let r = parse_line("0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000 0 0 1").unwrap();
        assert_eq!(r.state, State::Listen);
        assert_eq!(r.local_port, 8080);
        assert_eq!(r.remote_port, 8080);
        assert_eq!(r.remote_addr.to_string(), "0.0.0.0");
    }

    #[test]
    fn listen_ignores_raw_remote_port() {
        let r = parse_line("0: 0A00000A:0050 0B00000A:D431 0A").unwrap();
        assert_eq!(r.remote_port, 80);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(parse_line("0: 0100007F:1F90 0A"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_line(""), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_line("0: 0100007F 04030201:01BB 01"), Err(Error::MalformedRecord(_))));
        assert!(matches!(parse_line("0: 0100007F:1F90 04030201:01BB:00 01"), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn header_only_is_empty() {
        let (_root, reader) = table(&[HEADER]);
        assert!(reader.read(4242).unwrap().is_empty());
    }

    #[test]
    fn empty_file_is_empty() {
        let (_root, reader) = table(&[]);
        assert!(reader.read(4242).unwrap().is_empty());
    }

    #[test]
    fn header_is_skipped_whatever_it_holds() {
        let line = "0: 0A00000A:C350 04030201:01BB 01";
        let (_root, reader) = table(&[line, line]);
        assert_eq!(reader.read(4242).unwrap().len(), 1);
    }

    #[test]
    fn reads_in_file_order_and_skips_bad_lines() {
        let (_root, reader) = table(&[
            HEADER,
            "   0: 0A00000A:C350 04030201:01BB 01 00000000:00000000 00:00000000 00000000  1000 0 1",
            "   1: garbage",
            "   2: 0100007F:1F90 0100007F:C351 01 00000000:00000000 00:00000000 00000000  1000 0 2",
            "   3: 0A00000A:C352 04030201",
            "   4: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000 0 3",
            "   5: 0A00000A:C353 0100007F:0CEA 06 00000000:00000000 00:00000000 00000000  1000 0 4",
        ]);

        let records = reader.read(4242).unwrap();
        let states  = records.iter().map(|r| r.state).collect::<Vec<_>>();

        assert_eq!(states, vec![State::Established, State::Listen, State::TimeWait]);
        assert_eq!(records[0].remote_addr.to_string(), "1.2.3.4");
        assert_eq!(records[0].remote_port, 443);
        assert_eq!(records[0].local_port, 50000);
        assert_eq!(records[1].remote_port, 8080);
        assert_eq!(records[2].remote_addr.to_string(), "127.0.0.1");
    }

    #[test]
    fn invalid_utf8_skips_only_that_line() {
        let root = tempfile::tempdir().unwrap();
        let dir  = root.path().join("1").join("net");
        fs::create_dir_all(&dir).unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(HEADER.as_bytes());
        data.extend_from_slice(b"\n   0: 0A00000A:C350 04030201:01BB 01\n");
        data.extend_from_slice(b"   1: \xff\xfe junk\n");
        data.extend_from_slice(b"   2: 0A00000A:C351 04030201:01BB 06\n");
        fs::write(dir.join("tcp"), data).unwrap();

        let records = TableReader::new(root.path()).read(1).unwrap();
        let states  = records.iter().map(|r| r.state).collect::<Vec<_>>();

        assert_eq!(states, vec![State::Established, State::TimeWait]);
    }

    #[test]
    fn unknown_addresses_are_kept() {
        let (_root, reader) = table(&[HEADER, "0: 0100007F:1F90 DEADBEEF00:01BB 01"]);
        let records = reader.read(4242).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_addr, Addr::Unknown);
    }

    #[test]
    fn missing_table_is_unreadable() {
        let root   = tempfile::tempdir().unwrap();
        let reader = TableReader::new(root.path());
        match reader.read(1) {
            Err(Error::TableUnreadable { path, .. }) => {
                assert_eq!(path, root.path().join("1/net/tcp"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

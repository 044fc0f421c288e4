//! NETASCII translation for text-mode transfers
//!
//! Local text is converted on the fly while blocks are read: LF becomes CR LF and a
//! bare CR becomes CR NUL (RFC 764). The translated stream is longer than the file,
//! so a block boundary may fall between the two bytes of a pair; the second byte is
//! carried over to the next read.

use std::io::{self, BufRead, BufReader, Read};

pub struct NetasciiReader<R> {
    inner: BufReader<R>,
    pending: Option<u8>,
}

impl<R: Read> NetasciiReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: None,
        }
    }
}

impl<R: Read> Read for NetasciiReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;

        while n < buf.len() {
            if let Some(byte) = self.pending.take() {
                buf[n] = byte;
                n += 1;
                continue;
            }

            let available = self.inner.fill_buf()?;
            let Some(&byte) = available.first() else {
                break;
            };
            self.inner.consume(1);

            buf[n] = match byte {
                b'\n' => {
                    self.pending = Some(b'\n');
                    b'\r'
                }
                b'\r' => {
                    self.pending = Some(b'\0');
                    b'\r'
                }
                other => other,
            };
            n += 1;
        }

        Ok(n)
    }
}

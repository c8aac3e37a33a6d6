use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// An in-memory output sink that can be read while a VM owns a handle to it.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Bytes written so far, decoded as UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn clear(&self) {
        match self.0.lock() {
            Ok(mut buf) => buf.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let out = SharedOutput::new();
        let mut handle = out.clone();
        handle.write_all(b"hi").unwrap();
        assert_eq!(out.contents(), b"hi");
        assert_eq!(out.to_string_lossy(), "hi");

        out.clear();
        assert!(handle.contents().is_empty());
    }
}

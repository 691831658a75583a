use std::{cell::RefCell, fmt::Write, fs::File, io, path::PathBuf, rc::Rc};

pub struct StringBuffer {
    s: String,
}

impl StringBuffer {
    pub fn new() -> StringBuffer {
        StringBuffer { s: String::new() }
    }

    pub fn as_str(&self) -> &str {
        self.s.as_str()
    }

    pub fn lines(&self) -> Vec<String> {
        self.s.lines().map(|l| l.to_string()).collect()
    }
}

// String only implements fmt::Write
impl io::Write for StringBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let str_rep = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.s
            .write_str(str_rep)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct StrReader<'a> {
    s: &'a str,
    cursor: usize,
}

impl<'a> From<&'a str> for StrReader<'a> {
    fn from(value: &'a str) -> Self {
        StrReader { s: value, cursor: 0 }
    }
}

impl<'a> io::Read for StrReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self.s.as_bytes();
        if self.cursor >= bytes.len() {
            return Ok(0);
        }
        let to_read = buf.len().min(bytes.len() - self.cursor);
        buf[..to_read].copy_from_slice(&bytes[self.cursor..self.cursor + to_read]);
        self.cursor += to_read;
        Ok(to_read)
    }
}

// A shared stream writer. Warnings and errors meant for the user go
// through one of these, so that they can go to stderr in the CLI, or be
// captured in a buffer by tests.
#[derive(Clone)]
pub struct WriteHandle {
    w: Rc<RefCell<dyn io::Write>>,
}

impl WriteHandle {
    pub fn stdout_write_handle() -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(io::stdout())) }
    }

    pub fn stderr_write_handle() -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(io::stderr())) }
    }

    pub fn string_buff_write_handle() -> (WriteHandle, Rc<RefCell<StringBuffer>>) {
        let buffer = Rc::new(RefCell::new(StringBuffer::new()));
        let h = WriteHandle { w: buffer.clone() };
        (h, buffer)
    }

    pub fn file_write_handle(f: File) -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(f)) }
    }

    pub fn empty_write_handle() -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(io::empty())) }
    }
}

impl io::Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Also trace, since the test harness cannot capture writes made
        // directly to stdout/stderr.
        tracing::info!("WriteHandle::write {}", String::from_utf8_lossy(buf).trim_end());
        self.w.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.borrow_mut().flush()
    }
}

// A named input, either a file path to be opened on demand, or
// in-memory text (from tests, or pre-read content).
pub enum DescribedReader {
    String((String, String)),
    FilePath(PathBuf),
}

impl DescribedReader {
    pub fn from_string(desc: String, data: String) -> DescribedReader {
        DescribedReader::String((desc, data))
    }

    pub fn from_file_path(path: PathBuf) -> DescribedReader {
        DescribedReader::FilePath(path)
    }

    pub fn desc(&self) -> &str {
        match self {
            DescribedReader::String((name, _)) => name,
            DescribedReader::FilePath(path) => {
                path.to_str().unwrap_or("<unknown path>")
            }
        }
    }

    pub fn reader<'a>(&'a self) -> Result<Box<dyn io::Read + 'a>, io::Error> {
        match self {
            DescribedReader::String((_, text)) => {
                Ok(Box::new(StrReader::from(text.as_str())))
            }
            DescribedReader::FilePath(path) => Ok(Box::new(File::open(path)?)),
        }
    }
}

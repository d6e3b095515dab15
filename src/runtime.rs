//! Support code that generated records link against: bounds-checked buffers,
//! the wire error taxonomy, ownership release and describe sinks.
//!
//! Nothing here holds global state; every call works on the buffer and value
//! it is handed.

use std::fmt;
use tracing::Level;

/// Failure of a generated decode or encode. Propagated unchanged through
/// nested records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum WireError {
    #[error("buffer too short")]
    OutOfBounds,
    #[error("missing value or unknown record")]
    NullReference,
    #[error("allocation failed")]
    AllocationFailure,
}

/// Flat status code for callers that want one value per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    OutOfBounds = 1,
    NullReference = 2,
    AllocationFailure = 3,
}

impl From<WireError> for ErrorCode {
    fn from(e: WireError) -> Self {
        match e {
            WireError::OutOfBounds => ErrorCode::OutOfBounds,
            WireError::NullReference => ErrorCode::NullReference,
            WireError::AllocationFailure => ErrorCode::AllocationFailure,
        }
    }
}

impl<T> From<&Result<T, WireError>> for ErrorCode {
    fn from(r: &Result<T, WireError>) -> Self {
        match r {
            Ok(_) => ErrorCode::Ok,
            Err(e) => (*e).into(),
        }
    }
}

impl<T> From<Result<T, WireError>> for ErrorCode {
    fn from(r: Result<T, WireError>) -> Self {
        ErrorCode::from(&r)
    }
}

// ==================== Buffers ====================

/// Read cursor over caller-owned bytes. The bytes before [`ReadBuf::position`]
/// are consumed; [`ReadBuf::remaining`] is the rest.
#[derive(Debug, Clone)]
pub struct ReadBuf<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadBuf<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ReadBuf { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// `OutOfBounds` unless at least `n` bytes remain. Consumes nothing.
    pub fn ensure(&self, n: usize) -> Result<(), WireError> {
        if n <= self.remaining_len() {
            Ok(())
        } else {
            Err(WireError::OutOfBounds)
        }
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        let b = *self.data.get(self.pos).ok_or(WireError::OutOfBounds)?;
        self.pos += 1;
        Ok(b)
    }

    /// Next `N` bytes in wire order. On failure nothing is consumed.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Borrow the next `n` bytes, for externally-owned payloads.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

/// Write cursor over a caller-owned, pre-sized buffer.
#[derive(Debug)]
pub struct WriteBuf<'a> {
    data: &'a mut [u8],
    pos: usize,
    refused: bool,
}

impl<'a> WriteBuf<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        WriteBuf {
            data,
            pos: 0,
            refused: false,
        }
    }

    /// Whether a write was refused for lack of space.
    pub fn exhausted(&self) -> bool {
        self.refused
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    pub fn set_u8(&mut self, b: u8) -> Result<(), WireError> {
        self.put_slice(&[b])
    }

    pub fn set_array<const N: usize>(&mut self, bytes: &[u8; N]) -> Result<(), WireError> {
        self.put_slice(bytes)
    }

    /// Write all of `bytes` or nothing.
    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        if bytes.len() > self.remaining_len() {
            self.refused = true;
            return Err(WireError::OutOfBounds);
        }
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

// ==================== Ownership ====================

/// Release every owned substructure of a value, leaving it empty.
///
/// Safe on a value that owns nothing (`None`, empty vectors, defaults).
/// Calling it twice on the same value is allowed but not required to be
/// meaningful.
pub trait Dispose {
    fn dispose(&mut self);
}

macro_rules! dispose_noop {
    ($($t:ty),*) => {
        $(impl Dispose for $t {
            fn dispose(&mut self) {}
        })*
    };
}

dispose_noop!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, ());

impl<T: Dispose> Dispose for Vec<T> {
    fn dispose(&mut self) {
        for item in self.iter_mut() {
            item.dispose();
        }
        *self = Vec::new();
    }
}

impl<T: Dispose> Dispose for Option<T> {
    fn dispose(&mut self) {
        if let Some(mut v) = self.take() {
            v.dispose();
        }
    }
}

impl<T: Dispose + ?Sized> Dispose for Box<T> {
    fn dispose(&mut self) {
        (**self).dispose();
    }
}

/// Build a default `T`, let `fill` decode into it, and on failure dispose the
/// partially filled value before forwarding the error unchanged.
pub fn decode_scoped<T, F>(fill: F) -> Result<T, WireError>
where
    T: Default + Dispose,
    F: FnOnce(&mut T) -> Result<(), WireError>,
{
    let mut out = T::default();
    match fill(&mut out) {
        Ok(()) => Ok(out),
        Err(e) => {
            out.dispose();
            Err(e)
        }
    }
}

// ==================== Describe ====================

/// Receiver of describe output: one call per rendered line, with
/// `enter`/`leave` around nested records.
pub trait DescribeSink {
    fn line(&mut self, args: fmt::Arguments<'_>);
    fn enter(&mut self, name: &str);
    fn leave(&mut self);
}

/// Renders each line as a `tracing` event at `level`, tagged with the dotted
/// path of enclosing records.
#[derive(Debug)]
pub struct TracingSink {
    level: Level,
    path: Vec<String>,
}

impl TracingSink {
    pub fn new(level: Level) -> Self {
        TracingSink {
            level,
            path: Vec::new(),
        }
    }
}

macro_rules! emit_at {
    ($level:expr, $path:expr, $args:expr) => {
        let level = $level;
        if level == Level::ERROR {
            tracing::error!(path = %$path, "{}", $args)
        } else if level == Level::WARN {
            tracing::warn!(path = %$path, "{}", $args)
        } else if level == Level::INFO {
            tracing::info!(path = %$path, "{}", $args)
        } else if level == Level::DEBUG {
            tracing::debug!(path = %$path, "{}", $args)
        } else {
            tracing::trace!(path = %$path, "{}", $args)
        }
    };
}

impl DescribeSink for TracingSink {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        let path = self.path.join(".");
        emit_at!(self.level, path, args);
    }

    fn enter(&mut self, name: &str) {
        self.path.push(name.to_string());
    }

    fn leave(&mut self) {
        self.path.pop();
    }
}

/// Collects indented lines in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineSink {
    pub lines: Vec<String>,
    depth: usize,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl DescribeSink for LineSink {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), args));
    }

    fn enter(&mut self, name: &str) {
        self.line(format_args!("{}:", name));
        self.depth += 1;
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Describe `items` as `name[start-end]: a b c` lines of at most `chunk`
/// elements. An empty slice produces no output.
pub fn describe_array<T, F>(sink: &mut dyn DescribeSink, name: &str, items: &[T], chunk: usize, mut render: F)
where
    F: FnMut(&T) -> String,
{
    let chunk = chunk.max(1);
    for (n, part) in items.chunks(chunk).enumerate() {
        let start = n * chunk;
        let end = start + part.len() - 1;
        let text = part.iter().map(&mut render).collect::<Vec<_>>().join(" ");
        sink.line(format_args!("{}[{}-{}]: {}", name, start, end, text));
    }
}

// ==================== Generated-code traits ====================

/// Implemented by every generated record.
pub trait Record: Sized + Default + Dispose {
    /// Decode one value from `buf`, advancing it by the bytes consumed.
    fn decode(buf: &mut ReadBuf<'_>) -> Result<Self, WireError>;

    /// Encode into `buf`, advancing it by the bytes written. Bytes written
    /// before a failing field stay in the buffer.
    fn encode(&self, buf: &mut WriteBuf<'_>) -> Result<(), WireError>;

    fn describe(&self, sink: &mut dyn DescribeSink);

    fn decode_from(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        let mut buf = ReadBuf::new(bytes);
        let value = Self::decode(&mut buf)?;
        Ok((value, buf.position()))
    }

    fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        let mut buf = WriteBuf::new(out);
        self.encode(&mut buf)?;
        Ok(buf.position())
    }

    /// Describe through `tracing` at `level`.
    fn trace(&self, level: Level) {
        let mut sink = TracingSink::new(level);
        self.describe(&mut sink);
    }
}

/// Application-supplied codec for one externally-owned field of record `R`.
///
/// `parent` is the record as decoded so far (fields declared before this
/// one are filled), or the full record when encoding.
pub trait ExternalField<R>: Default + Dispose + fmt::Debug {
    fn decode(parent: &R, buf: &mut ReadBuf<'_>) -> Result<Self, WireError>;
    fn encode(&self, parent: &R, buf: &mut WriteBuf<'_>) -> Result<(), WireError>;
    fn describe(&self, name: &str, sink: &mut dyn DescribeSink);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_buf_is_bounds_checked() {
        let mut r = ReadBuf::new(&[1, 2, 3]);
        assert_eq!(r.get_array::<2>(), Ok([1, 2]));
        assert_eq!(r.get_array::<2>(), Err(WireError::OutOfBounds));
        assert_eq!(r.position(), 2);
        assert_eq!(r.get_u8(), Ok(3));
        assert_eq!(r.get_u8(), Err(WireError::OutOfBounds));
        assert!(r.remaining().is_empty());
    }

    #[test]
    fn write_buf_writes_all_or_nothing() {
        let mut out = [0u8; 3];
        let mut w = WriteBuf::new(&mut out);
        w.set_u8(9).unwrap();
        assert!(!w.exhausted());
        assert_eq!(w.set_array(&[1, 2, 3]), Err(WireError::OutOfBounds));
        assert!(w.exhausted());
        assert_eq!(w.position(), 1);
        w.set_array(&[1, 2]).unwrap();
        assert_eq!(w.written(), [9, 1, 2]);
        assert_eq!(w.remaining_len(), 0);
    }

    #[derive(Default)]
    struct Counted(std::rc::Rc<std::cell::Cell<u32>>, Vec<u8>);

    impl Dispose for Counted {
        fn dispose(&mut self) {
            self.0.set(self.0.get() + 1);
            self.1.dispose();
        }
    }

    #[test]
    fn decode_scoped_disposes_on_failure() {
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let c = count.clone();
        let r: Result<Counted, _> = decode_scoped(|out: &mut Counted| {
            out.0 = c;
            out.1.push(1);
            Err(WireError::OutOfBounds)
        });
        assert_eq!(r.err(), Some(WireError::OutOfBounds));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispose_is_safe_on_empty_values() {
        let mut v: Vec<Vec<u8>> = vec![vec![1, 2], vec![]];
        v.dispose();
        assert!(v.is_empty());
        v.dispose();
        let mut o: Option<Vec<u8>> = None;
        o.dispose();
        assert!(o.is_none());
    }

    #[test]
    fn arrays_describe_in_chunks() {
        let items: Vec<u8> = (0..20).collect();
        let mut sink = LineSink::new();
        describe_array(&mut sink, "data", &items, 16, |b| format!("0x{:02X}", b));
        assert_eq!(sink.lines.len(), 2);
        assert!(sink.lines[0].starts_with("data[0-15]: 0x00 0x01"));
        assert_eq!(sink.lines[1], "data[16-19]: 0x10 0x11 0x12 0x13");
        describe_array(&mut sink, "none", &items[..0], 16, |b| b.to_string());
        assert_eq!(sink.lines.len(), 2);
    }

    #[test]
    fn error_codes() {
        let ok: Result<(), WireError> = Ok(());
        assert_eq!(ErrorCode::from(ok), ErrorCode::Ok);
        assert_eq!(
            ErrorCode::from(Err::<u8, _>(WireError::AllocationFailure)),
            ErrorCode::AllocationFailure
        );
    }
}

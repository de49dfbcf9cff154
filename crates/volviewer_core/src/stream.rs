//! # Byte Streams
//!
//! An append-only writer over a borrowed buffer (arena frontier or a stack
//! array). Overflow is sticky: the first append that does not fit sets the
//! error, every later append is a no-op, and materializing yields nothing.
//! Callers chain as many appends as they like and check once at the end.

use crate::error::{StreamError, StreamResult};

/// Text emitted for magnitudes too large to print as a decimal.
const INFINITY_TEXT: &[u8] = b"inf";

/// Text emitted for NaN.
const NAN_TEXT: &[u8] = b"nan";

/// Largest magnitude [`Stream::append_f64`] prints as digits (2^63).
const F64_PRINTABLE_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Bounds-checked append-only byte writer.
///
/// # Example
///
/// ```rust,ignore
/// let mut buf = [0u8; 64];
/// let mut s = Stream::new(&mut buf);
/// s.append_str("frame ");
/// s.append_u64(42);
/// assert_eq!(s.as_str(), "frame 42");
/// ```
#[derive(Debug)]
pub struct Stream<'a> {
    data: &'a mut [u8],
    widx: usize,
    errors: bool,
}

impl<'a> Stream<'a> {
    /// Creates an empty stream over `data`.
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            widx: 0,
            errors: false,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.widx
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.widx == 0
    }

    /// Returns true once any append has overflowed.
    #[inline]
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.errors
    }

    /// Appends raw bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.errors |= self.capacity() - self.widx < bytes.len();
        if !self.errors {
            self.data[self.widx..self.widx + bytes.len()].copy_from_slice(bytes);
            self.widx += bytes.len();
        }
    }

    /// Appends a single byte.
    #[inline]
    pub fn append_byte(&mut self, byte: u8) {
        self.append(&[byte]);
    }

    /// Appends UTF-8 text.
    #[inline]
    pub fn append_str(&mut self, text: &str) {
        self.append(text.as_bytes());
    }

    /// Appends several strings in order.
    pub fn append_strs(&mut self, parts: &[&str]) {
        for part in parts {
            self.append_str(part);
        }
    }

    /// Appends an unsigned integer in base 10.
    pub fn append_u64(&mut self, mut value: u64) {
        let mut digits = [0u8; 20];
        let mut start = digits.len();
        loop {
            start -= 1;
            // value % 10 < 10, the cast cannot truncate
            #[allow(clippy::cast_possible_truncation)]
            let digit = (value % 10) as u8;
            digits[start] = b'0' + digit;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.append(&digits[start..]);
    }

    /// Appends a signed integer in base 10.
    pub fn append_i64(&mut self, value: i64) {
        if value < 0 {
            self.append_byte(b'-');
        }
        self.append_u64(value.unsigned_abs());
    }

    /// Appends a decimal with `precision` as a power-of-ten scale.
    ///
    /// `precision = 100` prints two fraction digits. Half a unit at that
    /// precision is added before truncating, so `3.14159` at 1000 prints
    /// `3.142`. The rounding acts on the binary value: `1.005` at 100 prints
    /// `1.00` because `1.005` is stored slightly below itself. Magnitudes of
    /// 2^63 and above print `inf`; NaN prints `nan`. A zero precision is
    /// treated as 1.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn append_f64(&mut self, value: f64, precision: u64) {
        if value.is_nan() {
            self.append(NAN_TEXT);
            return;
        }

        let precision = precision.max(1);
        let mut value = value;
        if value < 0.0 {
            self.append_byte(b'-');
            value = -value;
        }

        value += 0.5 / precision as f64;
        if value >= F64_PRINTABLE_LIMIT {
            self.append(INFINITY_TEXT);
            return;
        }

        let integral = value as u64;
        let fraction = ((value - integral as f64) * precision as f64) as u64;
        self.append_u64(integral);
        self.append_byte(b'.');
        let mut place = precision / 10;
        while place > 1 {
            if place > fraction {
                self.append_byte(b'0');
            }
            place /= 10;
        }
        self.append_u64(fraction);
    }

    /// Appends `text`, wrapped in single quotes if it contains a space or a
    /// double quote. Used to log command lines.
    pub fn append_quoted(&mut self, text: &str) {
        let escape = text.bytes().any(|b| b == b' ' || b == b'"');
        if escape {
            self.append_byte(b'\'');
        }
        self.append_str(text);
        if escape {
            self.append_byte(b'\'');
        }
    }

    /// The unused tail, for writers that fill memory directly.
    ///
    /// Follow with [`Stream::commit`] to account for what was written.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        if self.errors {
            return &mut [];
        }
        &mut self.data[self.widx..]
    }

    /// Accounts for `count` bytes written through [`Stream::spare_mut`].
    pub fn commit(&mut self, count: usize) {
        self.errors |= self.capacity() - self.widx < count;
        if !self.errors {
            self.widx += count;
        }
    }

    /// Moves the write index to `index` and clears the error.
    ///
    /// An index beyond the capacity sets the error instead.
    pub fn reset(&mut self, index: usize) {
        self.errors = index > self.capacity();
        if !self.errors {
            self.widx = index;
        }
    }

    /// The written bytes, or nothing if the stream overflowed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        if self.errors {
            return &[];
        }
        &self.data[..self.widx]
    }

    /// The written bytes as text; empty on overflow or invalid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    /// Consumes the stream, yielding the written bytes or the overflow.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Overflow`] if any append did not fit.
    pub fn finish(self) -> StreamResult<&'a [u8]> {
        if self.errors {
            return Err(StreamError::Overflow {
                capacity: self.data.len(),
            });
        }
        let Self { data, widx, .. } = self;
        let data: &'a [u8] = data;
        Ok(&data[..widx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(build: impl FnOnce(&mut Stream<'_>)) -> String {
        let mut buf = [0u8; 128];
        let mut stream = Stream::new(&mut buf);
        build(&mut stream);
        stream.as_str().to_owned()
    }

    #[test]
    fn test_exact_capacity_then_overflow() {
        let mut buf = [0u8; 8];
        let mut stream = Stream::new(&mut buf);
        stream.append(b"abc");
        stream.append(b"defgh");
        assert!(!stream.has_error());
        assert_eq!(stream.as_bytes(), b"abcdefgh");

        stream.append_byte(b'!');
        assert!(stream.has_error());
        assert!(stream.as_bytes().is_empty());
        assert_eq!(
            stream.finish(),
            Err(StreamError::Overflow { capacity: 8 })
        );
    }

    #[test]
    fn test_error_is_sticky_until_reset() {
        let mut buf = [0u8; 4];
        let mut stream = Stream::new(&mut buf);
        stream.append(b"12345");
        stream.append(b"1");
        assert!(stream.has_error());
        assert_eq!(stream.len(), 0);

        stream.reset(0);
        assert!(!stream.has_error());
        stream.append(b"ok");
        assert_eq!(stream.as_str(), "ok");

        stream.reset(5);
        assert!(stream.has_error());
    }

    #[test]
    fn test_integers() {
        assert_eq!(render(|s| s.append_u64(0)), "0");
        assert_eq!(render(|s| s.append_u64(u64::MAX)), "18446744073709551615");
        assert_eq!(render(|s| s.append_i64(-42)), "-42");
        assert_eq!(render(|s| s.append_i64(i64::MIN)), "-9223372036854775808");
    }

    #[test]
    fn test_decimal_rounding_rule() {
        assert_eq!(render(|s| s.append_f64(1.005, 100)), "1.00");
        assert_eq!(render(|s| s.append_f64(3.14159, 1000)), "3.142");
        assert_eq!(render(|s| s.append_f64(-0.125, 100)), "-0.13");
        assert_eq!(render(|s| s.append_f64(9.999, 100)), "10.00");
        assert_eq!(render(|s| s.append_f64(0.05, 1000)), "0.050");
        assert_eq!(render(|s| s.append_f64(0.0, 100)), "0.00");
        assert_eq!(render(|s| s.append_f64(2.5, 10)), "2.5");
    }

    #[test]
    fn test_decimal_out_of_range() {
        assert_eq!(render(|s| s.append_f64(1e19, 100)), "inf");
        assert_eq!(render(|s| s.append_f64(-1e19, 100)), "-inf");
        assert_eq!(render(|s| s.append_f64(f64::NAN, 100)), "nan");
        assert_eq!(render(|s| s.append_f64(7.0, 0)), "7.0");
    }

    #[test]
    fn test_quoting() {
        let line = render(|s| {
            s.append_quoted("cc");
            s.append_byte(b' ');
            s.append_quoted("-I external/include");
            s.append_byte(b' ');
            s.append_quoted("say\"hi\"");
        });
        assert_eq!(line, "cc '-I external/include' 'say\"hi\"'");
    }

    #[test]
    fn test_spare_and_commit() {
        let mut buf = [0u8; 6];
        let mut stream = Stream::new(&mut buf);
        stream.append_str("ab");
        stream.spare_mut()[..3].copy_from_slice(b"cde");
        stream.commit(3);
        assert_eq!(stream.as_str(), "abcde");
        stream.commit(2);
        assert!(stream.has_error());
    }
}

//! Traces.
//!
//! A trace is a text file, one operation per line:
//!
//! ```text
//! # Comments, and blank lines, are ignored.
//! a 0 512         # Allocate 512 bytes, identified as 0.
//! r 0 1024        # Reallocate 0 to 1024 bytes.
//! f 0             # Free 0.
//! ```

use std::{error, fmt, str::FromStr};

/// An operation of a Trace.
///
/// Each allocation is identified by a small integer, which may be reused once freed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// Allocates `size` bytes, as `id`.
    Allocate {
        /// Identifier of the allocation.
        id: usize,
        /// Requested size.
        size: usize,
    },
    /// Frees `id`.
    Free {
        /// Identifier of the allocation.
        id: usize,
    },
    /// Reallocates `id` to `size` bytes.
    Reallocate {
        /// Identifier of the allocation.
        id: usize,
        /// Requested size.
        size: usize,
    },
}

impl Operation {
    /// Returns the identifier of the allocation affected.
    pub fn id(&self) -> usize {
        match *self {
            Operation::Allocate { id, .. } | Operation::Free { id } | Operation::Reallocate { id, .. } => id,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operation::Allocate { id, size } => write!(f, "a {} {}", id, size),
            Operation::Free { id } => write!(f, "f {}", id),
            Operation::Reallocate { id, size } => write!(f, "r {} {}", id, size),
        }
    }
}

/// A sequence of operations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trace {
    operations: Vec<Operation>,
    number_ids: usize,
}

impl Trace {
    /// Creates a Trace from its operations.
    pub fn new(operations: Vec<Operation>) -> Self {
        let number_ids = operations.iter().map(|o| o.id() + 1).max().unwrap_or(0);

        Self { operations, number_ids }
    }

    /// Generates a pseudo-random Trace of `length` operations, with requests of up to `max_size` bytes.
    ///
    /// The same `seed` always generates the same Trace. Every allocation is freed by the end of the Trace.
    ///
    /// The mix favors small requests, with the occasional large request, reallocation, and zero-sized request.
    pub fn random(seed: u64, length: usize, max_size: usize) -> Self {
        assert!(max_size > 0);

        let mut random = XorShift::new(seed);
        let mut live: Vec<usize> = vec!();
        let mut free: Vec<usize> = vec!();
        let mut operations = Vec::with_capacity(length + length / 2);

        let size = |random: &mut XorShift| -> usize {
            match random.below(64) {
                0 => 0,
                1..=47 => 1 + random.below(std::cmp::min(256, max_size)),
                _ => 1 + random.below(max_size),
            }
        };

        for _ in 0..length {
            let choice = if live.is_empty() { 0 } else { random.below(10) };

            match choice {
                0..=4 => {
                    let id = free.pop().unwrap_or_else(|| live.len());
                    operations.push(Operation::Allocate { id, size: size(&mut random) });
                    live.push(id);
                },
                5..=7 => {
                    let id = live.swap_remove(random.below(live.len()));
                    operations.push(Operation::Free { id });
                    free.push(id);
                },
                _ => {
                    let id = live[random.below(live.len())];
                    let size = size(&mut random);
                    operations.push(Operation::Reallocate { id, size });

                    //  A reallocation to 0 frees.
                    if size == 0 {
                        live.retain(|l| *l != id);
                        free.push(id);
                    }
                },
            }
        }

        while let Some(id) = live.pop() {
            operations.push(Operation::Free { id });
        }

        Self::new(operations)
    }

    /// Returns the operations.
    pub fn operations(&self) -> &[Operation] { &self.operations }

    /// Returns the number of identifiers used, that is the maximum identifier plus 1.
    pub fn number_ids(&self) -> usize { self.number_ids }
}

impl FromStr for Trace {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, ParseError> {
        let mut operations = vec!();

        for (index, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();

            if line.is_empty() {
                continue;
            }

            operations.push(parse_operation(line).ok_or_else(|| ParseError { line: index + 1 })?);
        }

        Ok(Self::new(operations))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for operation in &self.operations {
            writeln!(f, "{}", operation)?;
        }

        Ok(())
    }
}

/// ParseError
///
/// A line of the trace could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ParseError {
    line: usize,
}

impl ParseError {
    /// Returns the line at fault, starting at 1.
    pub fn line(&self) -> usize { self.line }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "invalid operation at line {}", self.line) }
}

impl error::Error for ParseError {}

//
//  Implementation Details
//

fn parse_operation(line: &str) -> Option<Operation> {
    let mut words = line.split_whitespace();

    let kind = words.next()?;
    let id = words.next()?.parse().ok()?;

    let operation = match kind {
        "a" => Operation::Allocate { id, size: words.next()?.parse().ok()? },
        "f" => Operation::Free { id },
        "r" => Operation::Reallocate { id, size: words.next()?.parse().ok()? },
        _ => return None,
    };

    if words.next().is_some() {
        return None;
    }

    Some(operation)
}

//  Xorshift64*, good enough to generate traces.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self { Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed }) }

    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    //  Returns a number in [0, bound).
    fn below(&mut self, bound: usize) -> usize { (self.next() % (bound as u64)) as usize }
}

//! Dense matrix storage and the matrix-valued frame.

use crate::format::AudioFormat;
use crate::frame::Frame;
use core::cell::OnceCell;

/// Minimal dense row-major matrix of `f32` values.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    columns: usize,
    values: Vec<f32>,
}

impl Matrix {
    /// All-zeros matrix.
    pub fn zero(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            values: vec![0.0; rows * columns],
        }
    }

    /// Build from explicit rows. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == columns),
            "all rows must have equal length"
        );
        Self {
            rows: rows.len(),
            columns,
            values: rows.iter().flatten().copied().collect(),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn get(&self, row: usize, column: usize) -> f32 {
        self.values[row * self.columns + column]
    }

    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: f32) {
        self.values[row * self.columns + column] = value;
    }

    /// One row as a slice.
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.values[row * self.columns..(row + 1) * self.columns]
    }
}

/// A frame carrying a matrix.
///
/// When a matrix-bearing frame is consumed where a 1-D frame is
/// expected, `data()` exposes row 0 by convention.
#[derive(Debug)]
pub struct AudioMatrix {
    index: u64,
    format: AudioFormat,
    matrix: Matrix,
    magnitudes: OnceCell<Vec<f32>>,
    powers: OnceCell<Vec<f32>>,
    zeros: OnceCell<Vec<f32>>,
}

impl AudioMatrix {
    pub fn new(index: u64, matrix: Matrix, format: AudioFormat) -> Self {
        Self {
            index,
            format,
            matrix,
            magnitudes: OnceCell::new(),
            powers: OnceCell::new(),
            zeros: OnceCell::new(),
        }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    fn first_row(&self) -> &[f32] {
        if self.matrix.rows() == 0 {
            &[]
        } else {
            self.matrix.row(0)
        }
    }
}

impl Frame for AudioMatrix {
    #[inline]
    fn frame_index(&self) -> u64 {
        self.index
    }

    #[inline]
    fn format(&self) -> &AudioFormat {
        &self.format
    }

    #[inline]
    fn len(&self) -> usize {
        self.matrix.columns()
    }

    #[inline]
    fn data(&self) -> &[f32] {
        self.first_row()
    }

    #[inline]
    fn real(&self) -> &[f32] {
        self.first_row()
    }

    fn imaginary(&self) -> &[f32] {
        self.zeros.get_or_init(|| vec![0.0; self.matrix.columns()])
    }

    fn magnitudes(&self) -> &[f32] {
        self.magnitudes
            .get_or_init(|| self.first_row().iter().map(|x| x.abs()).collect())
    }

    fn powers(&self) -> &[f32] {
        self.powers
            .get_or_init(|| self.first_row().iter().map(|x| x * x).collect())
    }
}

impl Clone for AudioMatrix {
    fn clone(&self) -> Self {
        Self::new(self.index, self.matrix.clone(), self.format)
    }
}

impl PartialEq for AudioMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.format == other.format && self.matrix == other.matrix
    }
}

/// Accumulates frames and emits their payloads as the rows of one
/// matrix at flush.
///
/// All collected frames must have equal length. Every retained payload
/// is copied out of the input frame.
pub struct MatrixCollector<F> {
    id: Option<String>,
    rows: Vec<Vec<f32>>,
    header: Option<(u64, AudioFormat)>,
    emitted: bool,
    out: crate::fanout::Fanout<AudioMatrix>,
    last: Option<AudioMatrix>,
    source: Option<Box<dyn crate::source::Source<Output = F>>>,
}

impl<F: Frame> MatrixCollector<F> {
    pub fn new() -> Self {
        Self {
            id: None,
            rows: Vec::new(),
            header: None,
            emitted: false,
            out: crate::fanout::Fanout::new(),
            last: None,
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn collect(&mut self, input: &F) -> crate::error::Result<()> {
        if let Some(first) = self.rows.first() {
            if first.len() != input.len() {
                return crate::error::format_error(format!(
                    "frame with {} samples does not match matrix width {}",
                    input.len(),
                    first.len()
                ));
            }
        } else {
            self.header = Some((input.frame_index(), *input.format()));
        }
        self.rows.push(input.data().to_vec());
        Ok(())
    }

    fn compute(&self) -> AudioMatrix {
        let (index, format) = self
            .header
            .unwrap_or((0, AudioFormat::mono(44100.0)));
        AudioMatrix::new(index, Matrix::from_rows(&self.rows), format)
    }
}

impl<F: Frame> Default for MatrixCollector<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> std::fmt::Display for MatrixCollector<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "MatrixCollector{{id={id}}}"),
            None => f.write_str("MatrixCollector"),
        }
    }
}

crate::node::impl_node!((F: Frame + 'static) MatrixCollector<F>, []);

impl<F: Frame + 'static> crate::processor::Sink for MatrixCollector<F> {
    type Input = F;

    fn process(&mut self, input: &F) -> crate::error::Result<()> {
        self.collect(input)
    }

    fn flush(&mut self) -> crate::error::Result<()> {
        let output = self.compute();
        self.out.process(&output)?;
        self.last = Some(output);
        self.emitted = true;
        self.out.flush()
    }
}

impl<F: Frame + 'static> crate::processor::Processor for MatrixCollector<F> {
    type Output = AudioMatrix;

    fn output(&self) -> Option<&AudioMatrix> {
        self.last.as_ref()
    }

    /// Drives the upstream to exhaustion and returns the matrix once.
    fn read(&mut self) -> crate::error::Result<Option<AudioMatrix>> {
        if self.emitted {
            return Ok(None);
        }
        loop {
            let Some(source) = self.source.as_mut() else {
                return Err(crate::error::Error::NoSource);
            };
            match source.read()? {
                Some(frame) => self.collect(&frame)?,
                None => break,
            }
        }
        let output = self.compute();
        self.last = Some(output.clone());
        self.emitted = true;
        Ok(Some(output))
    }

    fn set_source(&mut self, source: Box<dyn crate::source::Source<Output = F>>) {
        self.source = Some(source);
    }

    fn fanout(&self) -> &crate::fanout::Fanout<AudioMatrix> {
        &self.out
    }

    fn fanout_mut(&mut self) -> &mut crate::fanout::Fanout<AudioMatrix> {
        &mut self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_first_row() {
        let matrix = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let frame = AudioMatrix::new(0, matrix, AudioFormat::mono(100.0));
        assert_eq!(frame.data(), &[1.0, 2.0]);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut matrix = Matrix::zero(2, 3);
        matrix.set(1, 2, 5.0);
        assert_eq!(matrix.get(1, 2), 5.0);
        assert_eq!(matrix.row(1), &[0.0, 0.0, 5.0]);
    }
}

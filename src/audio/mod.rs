//! Audio I/O for the CLI frontend.
//!
//! Reads raw mono `f32` little-endian PCM, runs it through a [`Stage`] and
//! writes the result in the same format. Stdin and stdout are the usual
//! endpoints; the reader and writer are generic so files and in-memory
//! buffers work too.

use std::io::{self, Read, Write};

use crate::error::{OverdriveError, Result};
use crate::stages::Stage;

/// Buffer size for audio processing (in samples).
pub const BUFFER_SIZE: usize = 256;

const BYTES_PER_SAMPLE: usize = 4;

/// Block reader for raw `f32le` PCM.
pub struct AudioInput<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Bytes of an incomplete sample left over from the previous read
    pending: usize,
}

impl<R: Read> AudioInput<R> {
    /// Wrap a reader; its buffer holds one block of samples.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: vec![0u8; BUFFER_SIZE * BYTES_PER_SAMPLE],
            pending: 0,
        }
    }

    /// Read up to `samples.len()` samples.
    /// Returns the number of samples read, or 0 on EOF.
    pub fn read_block(&mut self, samples: &mut [f32]) -> Result<usize> {
        let bytes_wanted = samples.len() * BYTES_PER_SAMPLE;
        if self.buffer.len() < bytes_wanted {
            self.buffer.resize(bytes_wanted, 0);
        }

        // Keep reading until at least one whole sample is available
        let mut filled = self.pending;
        while filled < BYTES_PER_SAMPLE.min(bytes_wanted) {
            let n = match self.reader.read(&mut self.buffer[filled..bytes_wanted]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(OverdriveError::AudioInputError {
                        message: e.to_string(),
                    })
                }
            };
            if n == 0 {
                if filled > 0 {
                    log::warn!("dropping {filled} trailing bytes of a partial sample");
                }
                self.pending = 0;
                return Ok(0);
            }
            filled += n;
        }

        let samples_read = filled / BYTES_PER_SAMPLE;
        let used = samples_read * BYTES_PER_SAMPLE;
        for (sample, chunk) in samples
            .iter_mut()
            .zip(self.buffer[..used].chunks_exact(BYTES_PER_SAMPLE))
        {
            *sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        self.pending = filled - used;
        self.buffer.copy_within(used..filled, 0);
        Ok(samples_read)
    }
}

/// Block writer for raw `f32le` PCM.
pub struct AudioOutput<W> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> AudioOutput<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: vec![0u8; BUFFER_SIZE * BYTES_PER_SAMPLE],
        }
    }

    /// Write a block of samples.
    pub fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        let bytes_needed = samples.len() * BYTES_PER_SAMPLE;
        if self.buffer.len() < bytes_needed {
            self.buffer.resize(bytes_needed, 0);
        }

        for (chunk, &sample) in self.buffer[..bytes_needed]
            .chunks_exact_mut(BYTES_PER_SAMPLE)
            .zip(samples)
        {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }

        self.writer
            .write_all(&self.buffer[..bytes_needed])
            .map_err(|e| OverdriveError::AudioOutputError {
                message: e.to_string(),
            })
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| OverdriveError::AudioOutputError {
                message: e.to_string(),
            })
    }
}

/// Input gain, stage, output gain. Works in `f64` between the two gains.
pub struct Processor<'a> {
    stage: &'a mut dyn Stage,
    drive: f64,
    level: f64,
    scratch_in: Vec<f64>,
    scratch_out: Vec<f64>,
}

impl<'a> Processor<'a> {
    /// Run `stage` between an input gain `drive` and an output gain `level`.
    pub fn new(stage: &'a mut dyn Stage, drive: f64, level: f64) -> Self {
        Self {
            stage,
            drive,
            level,
            scratch_in: vec![0.0; BUFFER_SIZE],
            scratch_out: vec![0.0; BUFFER_SIZE],
        }
    }

    /// Process `min(input.len(), output.len())` samples.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let len = input.len().min(output.len());
        if self.scratch_in.len() < len {
            self.scratch_in.resize(len, 0.0);
            self.scratch_out.resize(len, 0.0);
        }

        for (x, &sample) in self.scratch_in[..len].iter_mut().zip(input) {
            *x = self.drive * f64::from(sample);
        }
        self.stage
            .process_block(&self.scratch_in[..len], &mut self.scratch_out[..len]);
        for (out, &y) in output[..len].iter_mut().zip(&self.scratch_out[..len]) {
            *out = (self.level * y) as f32;
        }
    }
}

/// Stream PCM from `reader` to `writer` through the stage until EOF.
/// Returns the number of samples processed.
pub fn process_stream<R: Read, W: Write>(
    stage: &mut dyn Stage,
    drive: f64,
    level: f64,
    reader: R,
    writer: W,
) -> Result<u64> {
    let mut input = AudioInput::new(reader);
    let mut output = AudioOutput::new(writer);
    let mut processor = Processor::new(stage, drive, level);

    let mut in_samples = vec![0.0f32; BUFFER_SIZE];
    let mut out_samples = vec![0.0f32; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let samples_read = input.read_block(&mut in_samples)?;

        if samples_read == 0 {
            break;
        }

        processor.process_block(&in_samples[..samples_read], &mut out_samples[..samples_read]);
        output.write_block(&out_samples[..samples_read])?;
        total += samples_read as u64;
    }

    output.flush()?;
    Ok(total)
}

/// Process audio from stdin to stdout using the given stage.
pub fn process_audio(stage: &mut dyn Stage, drive: f64, level: f64) -> Result<u64> {
    process_stream(stage, drive, level, io::stdin().lock(), io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{DiodeClipperParams, DiodeClipperStage};
    use std::io::Cursor;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn decode(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Hands out at most `chunk` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_read_block_reassembles_split_samples() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32 * 0.25).collect();
        let mut input = AudioInput::new(Trickle {
            data: encode(&samples),
            pos: 0,
            chunk: 3,
        });

        let mut collected = Vec::new();
        let mut block = [0.0f32; 4];
        loop {
            let n = input.read_block(&mut block).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&block[..n]);
        }
        assert_eq!(collected, samples);
    }

    #[test]
    fn test_unity_passthrough_below_bypass() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        let samples = [0.0f32, 0.01, -0.05, 0.09];
        let mut sink = Vec::new();

        let n = process_stream(&mut stage, 1.0, 1.0, Cursor::new(encode(&samples)), &mut sink)
            .unwrap();
        assert_eq!(n, samples.len() as u64);
        assert_eq!(decode(&sink), samples);
    }

    #[test]
    fn test_drive_and_level_are_applied() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        let mut processor = Processor::new(&mut stage, 0.5, 2.0);
        let input = [0.1f32, -0.1];
        let mut output = [0.0f32; 2];
        processor.process_block(&input, &mut output);
        // 0.05 after drive is below the bypass threshold, then doubled
        assert!((output[0] - 0.1).abs() < 1e-7);
        assert!((output[1] + 0.1).abs() < 1e-7);
    }

    #[test]
    fn test_large_blocks_grow_scratch() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        let mut processor = Processor::new(&mut stage, 4.0, 1.0);
        let input = vec![0.5f32; BUFFER_SIZE * 3];
        let mut output = vec![0.0f32; BUFFER_SIZE * 3];
        processor.process_block(&input, &mut output);
        assert!(output.iter().all(|y| y.is_finite() && y.abs() < 1.0));
    }

    #[test]
    fn test_empty_stream() {
        let mut stage = DiodeClipperStage::new(48000.0, DiodeClipperParams::default()).unwrap();
        let mut sink = Vec::new();
        let n = process_stream(&mut stage, 1.0, 1.0, Cursor::new(Vec::new()), &mut sink).unwrap();
        assert_eq!(n, 0);
        assert!(sink.is_empty());
    }
}

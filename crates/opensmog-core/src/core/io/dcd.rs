use nalgebra::Vector3;
use std::io::{self, Seek, SeekFrom, Write};
use thiserror::Error;

/// One AKMA time unit in picoseconds.
const AKMA_TIME_UNIT_PS: f64 = 0.04888821;
const NM_TO_ANGSTROM: f64 = 10.0;
const TITLE_LENGTH: usize = 80;

const FRAME_COUNT_OFFSET: u64 = 8;
const LAST_STEP_OFFSET: u64 = 20;

#[derive(Debug, Error)]
pub enum DcdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Frame has {found} atoms but the trajectory was created for {expected}")]
    AtomCountMismatch { expected: usize, found: usize },
    #[error("Trajectory header field overflow: {0}")]
    Overflow(&'static str),
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn padded_title(text: &str) -> [u8; TITLE_LENGTH] {
    let mut title = [b' '; TITLE_LENGTH];
    let bytes = text.as_bytes();
    let len = bytes.len().min(TITLE_LENGTH);
    title[..len].copy_from_slice(&bytes[..len]);
    title
}

/// Writer for CHARMM/NAMD-style binary DCD trajectories.
///
/// Coordinates are written in angstroms. The frame count and last step in
/// the header are rewritten after every frame so that a partially written
/// file stays readable.
pub struct DcdWriter<W: Write + Seek> {
    out: W,
    num_atoms: usize,
    first_step: i32,
    interval: i32,
    periodic: bool,
    frames: i32,
}

impl<W: Write + Seek> DcdWriter<W> {
    pub fn new(
        mut out: W,
        num_atoms: usize,
        first_step: i32,
        interval: i32,
        time_step_ps: f64,
        periodic: bool,
    ) -> Result<Self, DcdError> {
        let atoms = i32::try_from(num_atoms).map_err(|_| DcdError::Overflow("atom count"))?;

        let mut header = Vec::with_capacity(276);
        put_i32(&mut header, 84);
        header.extend_from_slice(b"CORD");
        put_i32(&mut header, 0);
        put_i32(&mut header, first_step);
        put_i32(&mut header, interval);
        put_i32(&mut header, first_step);
        for _ in 0..5 {
            put_i32(&mut header, 0);
        }
        header.extend_from_slice(&((time_step_ps / AKMA_TIME_UNIT_PS) as f32).to_le_bytes());
        put_i32(&mut header, i32::from(periodic));
        for _ in 0..8 {
            put_i32(&mut header, 0);
        }
        put_i32(&mut header, 24);
        put_i32(&mut header, 84);

        put_i32(&mut header, 164);
        put_i32(&mut header, 2);
        header.extend_from_slice(&padded_title("Created by OpenSMOG"));
        let created = chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        header.extend_from_slice(&padded_title(&format!("Created {}", created)));
        put_i32(&mut header, 164);

        put_i32(&mut header, 4);
        put_i32(&mut header, atoms);
        put_i32(&mut header, 4);

        out.write_all(&header)?;
        out.flush()?;

        Ok(Self {
            out,
            num_atoms,
            first_step,
            interval,
            periodic,
            frames: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames as usize
    }

    /// Appends one frame; `cell` holds the rectangular box edges in nm.
    pub fn write_frame(
        &mut self,
        positions: &[Vector3<f64>],
        cell: Option<Vector3<f64>>,
    ) -> Result<(), DcdError> {
        if positions.len() != self.num_atoms {
            return Err(DcdError::AtomCountMismatch {
                expected: self.num_atoms,
                found: positions.len(),
            });
        }

        let mut frame = Vec::with_capacity(56 + 3 * (4 * self.num_atoms + 8));

        if self.periodic {
            let edges = cell.unwrap_or_else(Vector3::zeros) * NM_TO_ANGSTROM;
            put_i32(&mut frame, 48);
            // a, gamma, b, beta, alpha, c
            for value in [edges.x, 90.0, edges.y, 90.0, 90.0, edges.z] {
                frame.extend_from_slice(&value.to_le_bytes());
            }
            put_i32(&mut frame, 48);
        }

        let record = (4 * self.num_atoms) as i32;
        for axis in 0..3 {
            put_i32(&mut frame, record);
            for position in positions {
                frame.extend_from_slice(&((position[axis] * NM_TO_ANGSTROM) as f32).to_le_bytes());
            }
            put_i32(&mut frame, record);
        }

        self.out.seek(SeekFrom::End(0))?;
        self.out.write_all(&frame)?;
        self.frames = self
            .frames
            .checked_add(1)
            .ok_or(DcdError::Overflow("frame count"))?;
        self.update_header()?;
        Ok(())
    }

    fn update_header(&mut self) -> Result<(), DcdError> {
        let last_step = self
            .interval
            .checked_mul(self.frames)
            .and_then(|offset| offset.checked_add(self.first_step))
            .ok_or(DcdError::Overflow("last step"))?;
        self.out.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        self.out.write_all(&self.frames.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(LAST_STEP_OFFSET))?;
        self.out.write_all(&last_step.to_le_bytes())?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

//! Wire format for outbound feature datagrams
//!
//! Each analysis frame is one self-contained datagram of 19 little-endian
//! IEEE-754 32-bit floats (76 bytes), in fixed order: `brightness, flux,
//! low, mid, high, bpm, is_beat, notes[0..11]`. There is no framing and no
//! sequence number; consumers treat every datagram as the latest state.

use crate::features::chroma::NUM_CLASSES;

/// Number of floats in one feature frame
pub const FRAME_FLOATS: usize = 7 + NUM_CLASSES;

/// Size of one packed feature frame in bytes
pub const FRAME_BYTES: usize = FRAME_FLOATS * 4;

/// One frame of extracted features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureFrame {
    /// Spectral centroid normalized by Nyquist, in [0, 1]
    pub brightness: f32,
    /// Percussive transient flux, in [0, 1]
    pub flux: f32,
    /// Low band energy, in [0, 1]
    pub low: f32,
    /// Mid band energy, in [0, 1]
    pub mid: f32,
    /// High band energy, in [0, 1]
    pub high: f32,
    /// Hedged, smoothed tempo; 0.0 before any onset
    pub bpm: f32,
    /// True for exactly one frame per declared onset
    pub is_beat: bool,
    /// Note energies in pitch-class order C, C#, ..., B, each in [0, 1]
    pub notes: [f32; NUM_CLASSES],
}

impl Default for FeatureFrame {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            flux: 0.0,
            low: 0.0,
            mid: 0.0,
            high: 0.0,
            bpm: 0.0,
            is_beat: false,
            notes: [0.0; NUM_CLASSES],
        }
    }
}

impl FeatureFrame {
    /// Pack the frame into its 76-byte wire representation
    pub fn pack(&self) -> [u8; FRAME_BYTES] {
        let mut out = [0u8; FRAME_BYTES];
        let beat = if self.is_beat { 1.0f32 } else { 0.0 };
        let head = [
            self.brightness,
            self.flux,
            self.low,
            self.mid,
            self.high,
            self.bpm,
            beat,
        ];

        for (i, value) in head.iter().chain(self.notes.iter()).enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode a packed frame; `None` when the payload is not 76 bytes
    pub fn unpack(payload: &[u8]) -> Option<Self> {
        if payload.len() != FRAME_BYTES {
            return None;
        }

        let mut floats = [0.0f32; FRAME_FLOATS];
        for (i, slot) in floats.iter_mut().enumerate() {
            let bytes: [u8; 4] = payload[i * 4..i * 4 + 4].try_into().ok()?;
            *slot = f32::from_le_bytes(bytes);
        }

        let mut notes = [0.0f32; NUM_CLASSES];
        notes.copy_from_slice(&floats[7..]);

        Some(Self {
            brightness: floats[0],
            flux: floats[1],
            low: floats[2],
            mid: floats[3],
            high: floats[4],
            bpm: floats[5],
            is_beat: floats[6] > 0.5,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_76_bytes() {
        assert_eq!(FRAME_BYTES, 76);
        assert_eq!(FeatureFrame::default().pack().len(), 76);
    }

    #[test]
    fn test_field_order_and_endianness() {
        let frame = FeatureFrame {
            brightness: 0.25,
            flux: 0.5,
            low: 0.1,
            mid: 0.2,
            high: 0.3,
            bpm: 128.0,
            is_beat: true,
            notes: [
                0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 0.05,
            ],
        };
        let packed = frame.pack();

        assert_eq!(&packed[0..4], &0.25f32.to_le_bytes());
        assert_eq!(&packed[20..24], &128.0f32.to_le_bytes());
        assert_eq!(&packed[24..28], &1.0f32.to_le_bytes());
        assert_eq!(&packed[28..32], &0.0f32.to_le_bytes());
        assert_eq!(&packed[72..76], &0.05f32.to_le_bytes());
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let frame = FeatureFrame {
            brightness: 0.018,
            flux: 0.9,
            low: 0.6,
            mid: 0.4,
            high: 0.2,
            bpm: 174.0,
            is_beat: false,
            notes: [0.5; NUM_CLASSES],
        };
        assert_eq!(FeatureFrame::unpack(&frame.pack()), Some(frame));
    }

    #[test]
    fn test_unpack_rejects_wrong_size() {
        assert_eq!(FeatureFrame::unpack(&[0u8; 75]), None);
        assert_eq!(FeatureFrame::unpack(&[0u8; 80]), None);
    }
}

//! Packed binary stay format (`.dspak`).
//!
//! A small magic/version envelope around the bincode encoding of the
//! in-memory `StaySet`, so loading is a byte-exact round-trip of saving.

use std::io::{Read, Write};

use casemix_core::CasemixError;

use crate::stay::StaySet;

const PACK_MAGIC: &[u8; 8] = b"DSPAK01\n";

impl StaySet {
    pub fn save_pack(&self, writer: &mut impl Write) -> Result<(), CasemixError> {
        writer.write_all(PACK_MAGIC)?;
        let payload =
            bincode::serialize(self).map_err(|err| CasemixError::Pack(err.to_string()))?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        Ok(())
    }

    pub fn load_pack(reader: &mut impl Read) -> Result<StaySet, CasemixError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != PACK_MAGIC {
            return Err(CasemixError::Pack("bad magic".to_string()));
        }

        let mut len_bytes = [0u8; 8];
        reader.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        bincode::deserialize(&payload).map_err(|err| CasemixError::Pack(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stay::{ProcedureRealisation, Stay, StayEntry, StayExit};
    use casemix_core::{DiagnosisCode, ProcedureCode, Sex, UnitCode};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn pack_roundtrip_is_exact() {
        let set = StaySet {
            stays: vec![Stay {
                admin_id: 7,
                bill_id: 1001,
                sex: Some(Sex::Female),
                birthdate: date(1964, 2, 14),
                entry: StayEntry { date: date(2019, 4, 2), mode: b'8', origin: 0 },
                exit: StayExit { date: date(2019, 4, 6), mode: b'8', destination: 0 },
                unit: UnitCode(210),
                session_count: 0,
                igs2: 33,
                main_diagnosis: "J181".parse::<DiagnosisCode>().unwrap(),
                other_diagnoses: vec!["I10".parse().unwrap()],
                procedures: vec![ProcedureRealisation {
                    proc: "EBLA003".parse::<ProcedureCode>().unwrap(),
                    phase: 0,
                    activities: 1 << 1,
                    count: 1,
                    date: date(2019, 4, 3),
                }],
                ..Default::default()
            }],
        };

        let mut buffer = Vec::new();
        set.save_pack(&mut buffer).unwrap();
        let reloaded = StaySet::load_pack(&mut buffer.as_slice()).unwrap();
        assert_eq!(set, reloaded);

        // Saving the reloaded set reproduces the same bytes.
        let mut buffer2 = Vec::new();
        reloaded.save_pack(&mut buffer2).unwrap();
        assert_eq!(buffer, buffer2);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let data = b"NOTAPACKxxxxxxxx".to_vec();
        assert!(StaySet::load_pack(&mut data.as_slice()).is_err());
    }
}

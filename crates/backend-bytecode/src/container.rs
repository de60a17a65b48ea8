//! `.kjb` persisted bytecode container (§10.4), directly grounded on the
//! teacher's `.exki` format (`exn.rs`): a 4-byte magic, a length-prefixed
//! JSON manifest, then a length-prefixed JSON body — renamed here because
//! it carries this crate's `CompiledProgram` (state-layout/slot table)
//! rather than kicomp's script constant pool.

use crate::opcode::CompiledProgram;
use std::io::{self, Read, Write};

const MAGIC: &[u8; 4] = b"SGKJ";

pub fn write_kjb<W: Write>(writer: &mut W, program: &CompiledProgram) -> io::Result<()> {
    writer.write_all(MAGIC)?;

    let manifest = serde_json::json!({
        "version": program.version,
        "functions": program.functions.len(),
        "slots": program.slot_kinds.len(),
        "total_size": program.total_size,
        "standalone": program.standalone,
        "format": "sigflow-bytecode-v1",
    });
    let manifest_bytes = serde_json::to_vec(&manifest).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writer.write_all(&(manifest_bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&manifest_bytes)?;

    let body = serde_json::to_vec(program).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(&body)?;
    Ok(())
}

pub fn read_kjb<R: Read>(reader: &mut R) -> io::Result<CompiledProgram> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("invalid .kjb magic: {magic:?}")));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let manifest_len = u32::from_le_bytes(len_bytes) as usize;
    let mut manifest_bytes = vec![0u8; manifest_len];
    reader.read_exact(&mut manifest_bytes)?;

    reader.read_exact(&mut len_bytes)?;
    let body_len = u32::from_le_bytes(len_bytes) as usize;
    let mut body_bytes = vec![0u8; body_len];
    reader.read_exact(&mut body_bytes)?;

    serde_json::from_slice(&body_bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{CompiledFunction, Instruction, Opcode};

    #[test]
    fn roundtrips_a_compiled_program() {
        let mut program = CompiledProgram::new();
        program.main = CompiledFunction::new("main");
        program.main.emit(Instruction::a_only(Opcode::Halt, 0));

        let mut buf = Vec::new();
        write_kjb(&mut buf, &program).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let loaded = read_kjb(&mut cursor).unwrap();
        assert_eq!(loaded.main.instructions.len(), 1);
        assert_eq!(loaded.version, "0.1.0");
    }

    #[test]
    fn rejects_a_bad_magic() {
        let buf = b"XXXX\x00\x00\x00\x00".to_vec();
        let mut cursor = io::Cursor::new(buf);
        assert!(read_kjb(&mut cursor).is_err());
    }
}

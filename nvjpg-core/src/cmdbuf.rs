//! Command-buffer builder: Host1x opcode emission plus the parallel submit
//! metadata (`nvhost_cmdbuf`/`_ext`/reloc triples) a submit ioctl needs.

use nvjpg_sys::host1x;
use nvjpg_sys::ioctl::{
    NvhostCmdbuf, NvhostCmdbufExt, NvhostReloc, NvhostRelocShift, NvhostRelocType, RelocType,
};
use nvjpg_sys::registers::{thi, NVHOST_RELOC_PLACEHOLDER, NVHOST_RELOC_SHIFT_DEFAULT};

use crate::error::{Error, Result};
use crate::fence::Fence;
use crate::memory::MemoryBlock;

struct OpenBuf {
    start_word: usize,
}

/// Builds one submit's worth of command buffers and relocations against a
/// single backing memory block, identified by `mem_handle`.
///
/// `clear()` resets the builder so the same instance — and the same
/// backing allocation — can be reused render after render.
pub struct CmdBuf {
    mem_handle: u32,
    words: Vec<host1x::Word>,
    cmdbufs: Vec<NvhostCmdbuf>,
    exts: Vec<NvhostCmdbufExt>,
    class_ids: Vec<u32>,
    relocs: Vec<NvhostReloc>,
    reloc_shifts: Vec<NvhostRelocShift>,
    reloc_types: Vec<NvhostRelocType>,
    open: Option<OpenBuf>,
}

impl CmdBuf {
    pub fn new(mem_handle: u32) -> CmdBuf {
        CmdBuf {
            mem_handle,
            words: Vec::new(),
            cmdbufs: Vec::new(),
            exts: Vec::new(),
            class_ids: Vec::new(),
            relocs: Vec::new(),
            reloc_shifts: Vec::new(),
            reloc_types: Vec::new(),
            open: None,
        }
    }

    /// Starts a new command buffer addressing `class_id`, emitting the
    /// leading `SET_CLASS` opcode every engine-register write after it
    /// relies on. `pre_fence`, if given, is a fence the engine must wait on
    /// before executing this buffer.
    pub fn begin(&mut self, class_id: u32, pre_fence: Option<Fence>) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::NoOpenCommandBuffer);
        }
        self.open = Some(OpenBuf { start_word: self.words.len() });
        self.push_raw(host1x::set_class(class_id, 0, 0));
        self.class_ids.push(class_id);
        self.exts.push(NvhostCmdbufExt {
            pre_fence: pre_fence.map_or(-1, |f| f.value as i32),
            reserved: 0,
        });
        Ok(())
    }

    /// Closes the command buffer opened by the matching `begin()`.
    pub fn end(&mut self) -> Result<()> {
        let open = self.open.take().ok_or(Error::NoOpenCommandBuffer)?;
        let word_count = (self.words.len() - open.start_word) as u32;
        self.cmdbufs.push(NvhostCmdbuf {
            mem: self.mem_handle,
            offset: (open.start_word * 4) as u32,
            words: word_count,
        });
        Ok(())
    }

    pub fn push_raw(&mut self, word: host1x::Word) {
        self.words.push(word);
    }

    /// Writes `value` into engine register `reg_offset` via the THI's
    /// `method_0`/`method_1` indirection: `INCR(method_0, 2)` followed by
    /// the target offset and the value.
    pub fn push_value(&mut self, reg_offset: u32, value: u32) {
        self.push_raw(host1x::incr(thi::METHOD_0, 2));
        self.push_raw(reg_offset);
        self.push_raw(value);
    }

    /// Writes the reloc placeholder into `reg_offset` and records a
    /// relocation asking the kernel to patch that word with
    /// `(target.device_addr() + target_offset) >> shift` at submit time.
    pub fn push_reloc(
        &mut self,
        reg_offset: u32,
        target: &MemoryBlock,
        target_offset: u32,
        shift: u32,
        reloc_type: RelocType,
    ) {
        self.push_value(reg_offset, NVHOST_RELOC_PLACEHOLDER);
        let placeholder_word = self.words.len() - 1;
        self.relocs.push(NvhostReloc {
            cmdbuf_mem: self.mem_handle,
            cmdbuf_offset: (placeholder_word * 4) as u32,
            target_mem: target.handle(),
            target_offset,
        });
        self.reloc_shifts.push(NvhostRelocShift { shift });
        self.reloc_types.push(NvhostRelocType { reloc_type: reloc_type as u32, padding: 0 });
    }

    /// `push_reloc` with the usual defaults: offset 0, shift 8, type
    /// `DEFAULT`.
    pub fn push_reloc_default(&mut self, reg_offset: u32, target: &MemoryBlock) {
        self.push_reloc(reg_offset, target, 0, NVHOST_RELOC_SHIFT_DEFAULT, RelocType::Default);
    }

    /// Resets the word pointer and every metadata vector so this builder
    /// can be reused for the next render.
    pub fn clear(&mut self) {
        self.words.clear();
        self.cmdbufs.clear();
        self.exts.clear();
        self.class_ids.clear();
        self.relocs.clear();
        self.reloc_shifts.clear();
        self.reloc_types.clear();
        self.open = None;
    }

    /// The accumulated words, ready to be copied into the backing memory
    /// block's CPU mapping ahead of submit.
    pub fn words(&self) -> &[host1x::Word] {
        &self.words
    }

    pub fn cmdbufs(&self) -> (&[NvhostCmdbuf], &[NvhostCmdbufExt], &[u32]) {
        (&self.cmdbufs, &self.exts, &self.class_ids)
    }

    pub fn relocs(&self) -> (&[NvhostReloc], &[NvhostRelocShift], &[NvhostRelocType]) {
        (&self.relocs, &self.reloc_shifts, &self.reloc_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(handle: u32) -> MemoryBlock {
        MemoryBlock::new(handle, 4096, 32)
    }

    #[test]
    fn reloc_ledger_matches_push_count() {
        let mut cb = CmdBuf::new(1);
        let pic_info = block(2);
        cb.begin(0xc0, None).unwrap();
        for offset in 0..5 {
            cb.push_reloc_default(offset, &pic_info);
        }
        cb.end().unwrap();

        let (relocs, shifts, types) = cb.relocs();
        assert_eq!(relocs.len(), 5);
        assert_eq!(shifts.len(), 5);
        assert_eq!(types.len(), 5);
        for reloc in relocs {
            let word = cb.words()[(reloc.cmdbuf_offset / 4) as usize];
            assert_eq!(word, NVHOST_RELOC_PLACEHOLDER);
        }
    }

    #[test]
    fn begin_emits_leading_set_class() {
        let mut cb = CmdBuf::new(1);
        cb.begin(0xc0, None).unwrap();
        cb.push_value(128, 1);
        cb.end().unwrap();

        assert_eq!(host1x::decode(cb.words()[0]).0, host1x::Family::SetClass);
        let (cmdbufs, exts, class_ids) = cb.cmdbufs();
        assert_eq!(cmdbufs.len(), 1);
        assert_eq!(exts.len(), 1);
        assert_eq!(class_ids, &[0xc0]);
    }

    #[test]
    fn end_without_begin_errors() {
        let mut cb = CmdBuf::new(1);
        assert!(matches!(cb.end(), Err(Error::NoOpenCommandBuffer)));
    }

    #[test]
    fn nested_begin_errors() {
        let mut cb = CmdBuf::new(1);
        cb.begin(0xc0, None).unwrap();
        assert!(matches!(cb.begin(0xc0, None), Err(Error::NoOpenCommandBuffer)));
    }

    #[test]
    fn clear_resets_everything() {
        let mut cb = CmdBuf::new(1);
        let pic_info = block(2);
        cb.begin(0xc0, None).unwrap();
        cb.push_reloc_default(448, &pic_info);
        cb.end().unwrap();
        cb.clear();
        assert!(cb.words().is_empty());
        assert!(cb.cmdbufs().0.is_empty());
        assert!(cb.relocs().0.is_empty());
    }
}

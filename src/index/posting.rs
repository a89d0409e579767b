use crate::compression::bitpack::{accounted_bytes, BitPackedBlock};
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::Result;
use crate::core::types::DocId;

/// One document's match against a single term: which token positions in
/// the field it occupied. Positions are strictly ascending (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn term_freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// On-disk/in-memory layout for a single term's postings:
/// `[min, max, bit_width, compressed_seq_ids..., compressed_positions_blob]`
/// (spec.md §4.3). Seq ids are frame-of-reference bit-packed; positions
/// are delta + variable-byte encoded per document, concatenated into one
/// blob addressed by decoding sequentially alongside the seq id block.
pub struct PostingList {
    seq_ids: BitPackedBlock,
    positions_blob: Vec<u8>,
}

impl PostingList {
    /// Encode a set of postings already sorted ascending by `doc_id`.
    pub fn encode(postings: &[Posting]) -> Result<Self> {
        let seq_ids: Vec<u32> = postings.iter().map(|p| p.doc_id.value() as u32).collect();
        let seq_block = BitPackedBlock::encode(&seq_ids);

        let mut positions_blob = Vec::new();
        for posting in postings {
            VByteEncoder::encode_u32(&mut positions_blob, posting.positions.len() as u32)?;
            let mut prev = 0u32;
            for &position in &posting.positions {
                VByteEncoder::encode_u32(&mut positions_blob, position - prev)?;
                prev = position;
            }
        }

        Ok(PostingList { seq_ids: seq_block, positions_blob })
    }

    pub fn empty() -> Self {
        PostingList { seq_ids: BitPackedBlock::encode(&[]), positions_blob: Vec::new() }
    }

    pub fn doc_freq(&self) -> usize {
        self.seq_ids.count
    }

    pub fn is_empty(&self) -> bool {
        self.seq_ids.count == 0
    }

    pub fn min_doc_id(&self) -> Option<DocId> {
        (!self.is_empty()).then(|| DocId::new(self.seq_ids.min as u64))
    }

    pub fn max_doc_id(&self) -> Option<DocId> {
        (!self.is_empty()).then(|| DocId::new(self.seq_ids.max as u64))
    }

    /// Decode just the seq id list, without touching the positions blob.
    /// This is the common path for set-intersection candidate generation.
    pub fn decode_doc_ids(&self) -> Vec<DocId> {
        self.seq_ids.decode().into_iter().map(|v| DocId::new(v as u64)).collect()
    }

    /// Fully decode every posting, including positions. Used once a
    /// document has survived intersection/filtering and proximity
    /// scoring needs its token positions.
    pub fn decode(&self) -> Result<Vec<Posting>> {
        let seq_ids = self.seq_ids.decode();
        let mut out = Vec::with_capacity(seq_ids.len());
        let mut cursor = 0usize;

        for seq_id in seq_ids {
            let (count, consumed) = VByteEncoder::decode_u32(&self.positions_blob[cursor..])?;
            cursor += consumed;
            let mut positions = Vec::with_capacity(count as usize);
            let mut prev = 0u32;
            for _ in 0..count {
                let (delta, consumed) = VByteEncoder::decode_u32(&self.positions_blob[cursor..])?;
                cursor += consumed;
                prev += delta;
                positions.push(prev);
            }
            out.push(Posting { doc_id: DocId::new(seq_id as u64), positions });
        }

        Ok(out)
    }

    /// Decode the positions for a single document, given its index among
    /// `decode_doc_ids()`'s output. Still linear in the blob since
    /// documents before it must be skipped.
    pub fn positions_for(&self, target: DocId) -> Result<Option<Vec<u32>>> {
        let seq_ids = self.seq_ids.decode();
        let mut cursor = 0usize;

        for seq_id in seq_ids {
            let (count, consumed) = VByteEncoder::decode_u32(&self.positions_blob[cursor..])?;
            cursor += consumed;
            if DocId::new(seq_id as u64) == target {
                let mut positions = Vec::with_capacity(count as usize);
                let mut prev = 0u32;
                for _ in 0..count {
                    let (delta, consumed) = VByteEncoder::decode_u32(&self.positions_blob[cursor..])?;
                    cursor += consumed;
                    prev += delta;
                    positions.push(prev);
                }
                return Ok(Some(positions));
            }
            for _ in 0..count {
                let (_, consumed) = VByteEncoder::decode_u32(&self.positions_blob[cursor..])?;
                cursor += consumed;
            }
        }

        Ok(None)
    }

    /// Bytes charged against memory accounting: the bit-packed seq id
    /// block's fixed overhead plus element slots, plus the positions blob.
    pub fn memory_footprint_bytes(&self) -> usize {
        accounted_bytes(self.seq_ids.count) + self.positions_blob.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: u64, positions: &[u32]) -> Posting {
        Posting { doc_id: DocId::new(id), positions: positions.to_vec() }
    }

    #[test]
    fn encodes_and_decodes_postings_round_trip() {
        let postings = vec![posting(1, &[1, 5]), posting(3, &[2]), posting(9, &[1, 2, 3])];
        let list = PostingList::encode(&postings).unwrap();
        let decoded = list.decode().unwrap();

        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].doc_id, DocId::new(1));
        assert_eq!(decoded[0].positions, vec![1, 5]);
        assert_eq!(decoded[2].positions, vec![1, 2, 3]);
    }

    #[test]
    fn doc_freq_matches_posting_count() {
        let postings = vec![posting(1, &[1]), posting(2, &[1])];
        let list = PostingList::encode(&postings).unwrap();
        assert_eq!(list.doc_freq(), 2);
    }

    #[test]
    fn positions_for_finds_the_right_document() {
        let postings = vec![posting(1, &[1]), posting(5, &[3, 4]), posting(7, &[2])];
        let list = PostingList::encode(&postings).unwrap();
        assert_eq!(list.positions_for(DocId::new(5)).unwrap(), Some(vec![3, 4]));
        assert_eq!(list.positions_for(DocId::new(42)).unwrap(), None);
    }

    #[test]
    fn empty_list_has_no_min_or_max() {
        let list = PostingList::empty();
        assert!(list.min_doc_id().is_none());
        assert!(list.max_doc_id().is_none());
    }
}

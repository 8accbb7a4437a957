// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Partial-state wire format.
//!
//! Pages moving INITIAL/INTERMEDIATE aggregation state between processes are
//! framed one page at a time: an 8-byte little-endian length followed by an Arrow
//! IPC stream holding that page. Each stream carries its own schema, so blocks stay
//! self-describing (element type, list offsets for multi-values, validity bitmap,
//! raw values) and a channel may be flat in one page and multi-valued in the next.

use std::io::Cursor;

use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::Block;
use crate::exec::page::Page;

const FRAME_HEADER_BYTES: usize = 8;

fn encode_page(page: &Page) -> ExecResult<Vec<u8>> {
    let batch = page.to_record_batch()?;
    let mut buffer = Vec::new();
    let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema())
        .map_err(|e| format!("failed to create Arrow IPC writer: {e}"))?;
    writer
        .write(&batch)
        .map_err(|e| format!("failed to write page: {e}"))?;
    writer
        .finish()
        .map_err(|e| format!("failed to finish Arrow IPC writer: {e}"))?;
    drop(writer);
    Ok(buffer)
}

fn decode_page(bytes: &[u8]) -> ExecResult<Page> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)
        .map_err(|e| format!("failed to create Arrow IPC reader: {e}"))?;
    let mut pages = Vec::with_capacity(1);
    for batch in reader {
        let batch = batch.map_err(|e| format!("failed to read page: {e}"))?;
        pages.push(Page::from_record_batch(&batch)?);
    }
    if pages.len() != 1 {
        return Err(ExecError::invalid_input(format!(
            "page frame must hold exactly one batch, found {}",
            pages.len()
        )));
    }
    Ok(pages.remove(0))
}

pub fn encode_pages(pages: &[Page]) -> ExecResult<Vec<u8>> {
    let mut out = Vec::new();
    for page in pages {
        let frame = encode_page(page)?;
        out.extend_from_slice(&(frame.len() as u64).to_le_bytes());
        out.extend_from_slice(&frame);
    }
    Ok(out)
}

pub fn decode_pages(bytes: &[u8]) -> ExecResult<Vec<Page>> {
    let mut pages = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let header_end = offset
            .checked_add(FRAME_HEADER_BYTES)
            .ok_or_else(|| ExecError::invalid_input("page frame offset overflows usize"))?;
        let header = bytes
            .get(offset..header_end)
            .ok_or_else(|| ExecError::invalid_input("truncated page frame header"))?;
        let mut len_bytes = [0u8; FRAME_HEADER_BYTES];
        len_bytes.copy_from_slice(header);
        let len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|_| ExecError::invalid_input("page frame length overflows usize"))?;
        offset = header_end;
        let frame = offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .ok_or_else(|| {
                ExecError::invalid_input(format!(
                    "truncated page frame: need {} bytes, have {}",
                    len,
                    bytes.len() - offset
                ))
            })?;
        pages.push(decode_page(frame)?);
        offset += len;
    }
    Ok(pages)
}

pub fn encode_block(block: &Block) -> ExecResult<Vec<u8>> {
    encode_page(&Page::new(vec![block.clone()])?)
}

pub fn decode_block(bytes: &[u8]) -> ExecResult<Block> {
    let page = decode_page(bytes)?;
    if page.block_count() != 1 {
        return Err(ExecError::invalid_input(format!(
            "block frame must hold one block, found {}",
            page.block_count()
        )));
    }
    page.block(0).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{BytesRefBlockBuilder, LongBlockBuilder};

    #[test]
    fn truncated_frames_are_rejected() {
        let mut b = LongBlockBuilder::with_capacity(1);
        b.append_value(1);
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let bytes = encode_pages(&[page]).expect("encode");
        assert!(decode_pages(&bytes[..bytes.len() - 3]).is_err());
        assert!(decode_pages(&bytes[..4]).is_err());
    }

    #[test]
    fn oversized_frame_length_is_rejected() {
        let mut bytes = (u64::MAX - 2).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let err = decode_pages(&bytes).expect_err("oversized frame");
        assert!(matches!(err, ExecError::InvalidInput(_)), "{err:?}");
    }

    #[test]
    fn pages_with_different_layouts_share_one_stream() {
        let mut flat = BytesRefBlockBuilder::with_capacity(1);
        flat.append_value(b"a");
        let mut multi = BytesRefBlockBuilder::with_capacity(1);
        multi
            .begin_position_entry()
            .append_value(b"a")
            .append_value(b"b")
            .end_position_entry();
        let pages = vec![
            Page::new(vec![flat.build().expect("flat")]).expect("page"),
            Page::new(vec![multi.build().expect("multi")]).expect("page"),
        ];
        let decoded = decode_pages(&encode_pages(&pages).expect("encode")).expect("decode");
        assert_eq!(decoded.len(), 2);
        assert!(!decoded[0].block(0).expect("b").may_have_multivalues());
        assert_eq!(decoded[1].block(0).expect("b").value_count(0), 2);
    }
}

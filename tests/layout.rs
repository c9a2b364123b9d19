// Layout conformance tests for transports that map the transport-visible
// state words directly. These assert sizes, alignments, and field offsets
// for BufferMetaData and OutputControlBlock, and print the observed values
// to aid debugging when a mismatch occurs on a given platform.
use dpxs_dataplane::DataPlane::Structs::{BufferMetaData, OutputControlBlock};

use crossbeam_utils::CachePadded;
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU32;

#[test]
fn test_buffer_meta_data_layout() {
    // Two u32 words then three one-byte flags, rounded up to u32 alignment.
    let raw = 4 + 4 + 1 + 1 + 1; // 11 bytes of fields
    let aligned = (raw + 3) & !3; // => 12

    let size = size_of::<BufferMetaData>();
    let align = align_of::<BufferMetaData>();
    let off_sequence = offset_of!(BufferMetaData, sequence);
    let off_parts_sequence = offset_of!(BufferMetaData, parts_sequence);
    let off_broad_cast = offset_of!(BufferMetaData, broad_cast);
    let off_end_of_stream = offset_of!(BufferMetaData, end_of_stream);
    let off_end_of_whole = offset_of!(BufferMetaData, end_of_whole);

    println!(
        "BufferMetaData => size: {size}, expected: {aligned}, align: {align}, offsets: [sequence:{off_sequence}, parts_sequence:{off_parts_sequence}, broad_cast:{off_broad_cast}, end_of_stream:{off_end_of_stream}, end_of_whole:{off_end_of_whole}]"
    );

    assert_eq!(size, aligned);
    assert_eq!(align, align_of::<u32>());
    assert_eq!(off_sequence, 0);
    assert_eq!(off_parts_sequence, 4);
    assert_eq!(off_broad_cast, 8);
    assert_eq!(off_end_of_stream, 9);
    assert_eq!(off_end_of_whole, 10);
}

#[test]
fn test_output_control_block_layout() {
    // The token occupies a full padded cache line so peer producers polling
    // it never false-share with the stream marks behind it.
    let token_span = size_of::<CachePadded<AtomicU32>>();

    let size = size_of::<OutputControlBlock>();
    let align = align_of::<OutputControlBlock>();
    let off_token = offset_of!(OutputControlBlock, sequential_control_token);
    let off_end_of_stream = offset_of!(OutputControlBlock, end_of_stream);
    let off_end_of_whole = offset_of!(OutputControlBlock, end_of_whole);

    println!(
        "OutputControlBlock => size: {size}, align: {align} (token span: {token_span}), offsets: [token:{off_token}, end_of_stream:{off_end_of_stream}, end_of_whole:{off_end_of_whole}]"
    );

    assert_eq!(align, align_of::<CachePadded<AtomicU32>>());
    assert_eq!(off_token, 0);
    assert_eq!(off_end_of_stream, token_span);
    assert_eq!(off_end_of_whole, token_span + 1);
    // Trailing padding brings the whole block back to token alignment.
    assert_eq!(size % align, 0);
}

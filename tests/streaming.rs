//! Handler-protocol exercises: window remapping, incremental reveal, and
//! the std::io adapters end to end.

use wirepack::{
    Error, FillSource, Item, OwnedItem, PackSink, Packer, ReadUnpacker, Result, Unpacker,
    WriteFlush,
};

/// Pack sink holding one spare, larger window; overflow relocates the
/// filled prefix into it.
struct Relocate<'a> {
    spare: Option<&'a mut [u8]>,
}

impl<'a> PackSink<'a> for Relocate<'a> {
    fn overflow(
        &mut self,
        window: &mut &'a mut [u8],
        filled: &mut usize,
        needed: usize,
    ) -> Result<()> {
        let spare = self
            .spare
            .take()
            .ok_or(Error::BufferOverflow { needed })?;
        spare[..*filled].copy_from_slice(&window[..*filled]);
        *window = spare;
        Ok(())
    }
}

/// Fill source that reveals a fixed buffer a few bytes at a time,
/// simulating data arriving behind the unpacker's back.
struct Reveal<'a> {
    data: &'a [u8],
    shown: usize,
    step: usize,
}

impl<'a> Reveal<'a> {
    fn new(data: &'a [u8], step: usize) -> Self {
        Self {
            data,
            shown: 0,
            step,
        }
    }
}

impl<'a> FillSource<'a> for Reveal<'a> {
    fn refill(&mut self, window: &mut &'a [u8], pos: &mut usize, needed: usize) -> Result<()> {
        let wanted = *pos + needed;
        if wanted > self.data.len() {
            return Err(Error::EndOfInput);
        }
        self.shown = self.data.len().min(wanted.max(self.shown + self.step));
        *window = &self.data[..self.shown];
        Ok(())
    }
}

#[test]
fn relocating_sink_preserves_written_bytes() {
    let mut small = [0u8; 8];
    let mut spare = [0u8; 256];
    let mut packer = Packer::with_sink(
        &mut small,
        Relocate {
            spare: Some(&mut spare),
        },
    );

    packer.pack_array_size(2).unwrap();
    packer.pack_unsigned(300).unwrap();
    packer.pack_str("relocated across windows").unwrap();
    assert_eq!(packer.return_code(), 0);

    let encoded = packer.written().to_vec();
    let mut unpacker = Unpacker::new(&encoded);
    assert_eq!(unpacker.next_item(), Ok(Item::Array(2)));
    assert_eq!(unpacker.next_item(), Ok(Item::PositiveInteger(300)));
    assert_eq!(
        unpacker.next_item(),
        Ok(Item::Str(b"relocated across windows"))
    );
}

#[test]
fn relocating_sink_refuses_twice() {
    let mut small = [0u8; 4];
    let mut spare = [0u8; 16];
    let mut packer = Packer::with_sink(
        &mut small,
        Relocate {
            spare: Some(&mut spare),
        },
    );

    packer.pack_unsigned(1 << 40).unwrap(); // 9 bytes, forces the spare
    let err = packer.pack_double(0.5).unwrap_err();
    assert_eq!(err, Error::BufferOverflow { needed: 9 });
}

#[test]
fn reveal_source_feeds_items_incrementally() {
    let mut buf = vec![0u8; 256];
    let mut packer = Packer::new(&mut buf);
    packer.pack_str("trickled in three-byte steps").unwrap();
    packer.pack_unsigned(70_000).unwrap();
    packer.pack_nil().unwrap();
    let encoded = packer.written().to_vec();

    let mut unpacker = Unpacker::with_source(&[], Reveal::new(&encoded, 3));
    assert_eq!(
        unpacker.next_item(),
        Ok(Item::Str(b"trickled in three-byte steps"))
    );
    assert_eq!(unpacker.next_item(), Ok(Item::PositiveInteger(70_000)));
    assert_eq!(unpacker.next_item(), Ok(Item::Nil));
    assert_eq!(unpacker.next_item(), Err(Error::EndOfInput));
}

#[test]
fn reveal_source_grades_truncation_as_underflow() {
    // str 8 declaring 60 payload bytes, source holding only 10
    let mut truncated = vec![0xd9, 60];
    truncated.extend_from_slice(&[b'x'; 10]);

    let mut unpacker = Unpacker::with_source(&[], Reveal::new(&truncated, 4));
    assert_eq!(
        unpacker.next_item(),
        Err(Error::BufferUnderflow { needed: 60 })
    );
    assert_eq!(unpacker.return_code(), -3);
}

#[test]
fn failing_source_error_propagates_verbatim() {
    struct Cancel;
    impl<'a> FillSource<'a> for Cancel {
        fn refill(
            &mut self,
            _window: &mut &'a [u8],
            _pos: &mut usize,
            _needed: usize,
        ) -> Result<()> {
            Err(Error::Stopped)
        }
    }

    let mut unpacker = Unpacker::with_source(&[0xcc], Cancel);
    assert_eq!(unpacker.next_item(), Err(Error::Stopped));
    assert_eq!(unpacker.return_code(), -9);
}

#[test]
fn io_adapters_round_trip_through_a_pipe_buffer() {
    let mut transported = Vec::new();
    let mut window = [0u8; 32];
    let mut packer = Packer::with_sink(&mut window, WriteFlush::new(&mut transported));

    packer.pack_map_size(2).unwrap();
    packer.pack_str("payload").unwrap();
    packer.pack_bin(&[0xab; 20]).unwrap();
    packer.pack_str("ok").unwrap();
    packer.pack_bool(true).unwrap();
    packer.flush().unwrap();
    assert_eq!(packer.return_code(), 0);
    drop(packer);

    let mut reader = ReadUnpacker::with_chunk_size(transported.as_slice(), 7);
    let mut items = Vec::new();
    while let Some(item) = reader.next_item().unwrap() {
        items.push(item);
    }
    assert_eq!(items.len(), 5);
    assert_eq!(items[0], OwnedItem::Map(2));
    assert_eq!(items[4], OwnedItem::Boolean(true));
    let OwnedItem::Bin(payload) = &items[2] else {
        panic!("expected the bin payload");
    };
    assert_eq!(payload.as_ref(), &[0xab; 20]);
}

#[test]
fn blob_views_can_be_copied_out_before_refill() {
    let mut buf = vec![0u8; 64];
    let mut packer = Packer::new(&mut buf);
    packer.pack_str("first").unwrap();
    packer.pack_str("second").unwrap();
    let encoded = packer.written().to_vec();

    let mut unpacker = Unpacker::with_source(&[], Reveal::new(&encoded, 2));
    let first = unpacker.next_item().unwrap().to_owned();
    // the next call refills the window; the owned copy must be unaffected
    let second = unpacker.next_item().unwrap().to_owned();
    assert_eq!(first, OwnedItem::Str(bytes::Bytes::from_static(b"first")));
    assert_eq!(second, OwnedItem::Str(bytes::Bytes::from_static(b"second")));
}

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tagwire_codec::{decode_all, encode_all, format, ByteOrder, Config, Error, Heap, Traversal};

#[derive(Arbitrary, Debug)]
struct FuzzInput<'a> {
    big_endian: bool,
    iterative: bool,
    fmt: Option<&'a str>,
    data: &'a [u8],
}

fn fuzz(input: FuzzInput) {
    let cfg = Config {
        byte_order: if input.big_endian {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        },
        traversal: if input.iterative {
            Traversal::Iterative
        } else {
            Traversal::Recursive
        },
        max_depth: 64,
        ..Config::default()
    };

    if let Some(fmt) = input.fmt {
        let _ = format::read(&mut Heap::new(), &cfg, input.data, 0, fmt);
        return;
    }

    // Anything that decodes must encode again, and the result must decode.
    let mut heap = Heap::new();
    let Ok(values) = decode_all(&mut heap, &cfg, input.data) else {
        return;
    };
    // Hash order may place a shared table deeper than where it was first decoded.
    let encoded = match encode_all(&heap, &cfg, &values) {
        Ok(encoded) => encoded,
        Err(Error::DepthExceeded(_)) => return,
        Err(err) => panic!("failed to re-encode decoded values: {err}"),
    };
    let decoded = decode_all(&mut Heap::new(), &cfg, &encoded)
        .expect("failed to decode re-encoded values");
    assert_eq!(values.len(), decoded.len());
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});

// tests/codec_properties.rs

use proptest::prelude::*;

use inotify_watcher::watch::codec::{RECORD_HEADER_LEN, encode_record};
use inotify_watcher::watch::{FramingError, decode_records};

proptest! {
    /// Arbitrary bytes never panic, and decoding ends after at most one
    /// error.
    #[test]
    fn arbitrary_bytes_never_panic(buf in proptest::collection::vec(any::<u8>(), 0..512)) {
        let results: Vec<_> = decode_records(&buf).collect();
        let errors = results.iter().filter(|r| r.is_err()).count();
        prop_assert!(errors <= 1);
        if errors == 1 {
            prop_assert!(results.last().unwrap().is_err());
        }
        prop_assert!(results.len() <= buf.len() / RECORD_HEADER_LEN + 1);
    }

    /// Cutting a record anywhere inside its name is always reported.
    #[test]
    fn truncated_name_is_always_a_framing_error(
        name in "[a-zA-Z0-9._-]{1,64}",
        cut in 1usize..4,
    ) {
        let record = encode_record(1, libc::IN_CLOSE_WRITE, 0, name.as_bytes());
        let cut = cut.min(record.len() - RECORD_HEADER_LEN);
        let buf = &record[..record.len() - cut];

        let results: Vec<_> = decode_records(buf).collect();
        prop_assert_eq!(results.len(), 1);
        let is_overrun = matches!(results[0], Err(FramingError::NameOverrun { .. }));
        prop_assert!(is_overrun);
    }

    /// Well-formed streams decode to the names that were encoded.
    #[test]
    fn encoded_names_come_back(names in proptest::collection::vec("[a-z]{0,20}", 1..20)) {
        let buf: Vec<u8> = names
            .iter()
            .flat_map(|n| encode_record(1, libc::IN_CREATE, 0, n.as_bytes()))
            .collect();

        let decoded: Vec<String> = decode_records(&buf)
            .map(|r| r.unwrap().name().to_string_lossy().into_owned())
            .collect();
        prop_assert_eq!(decoded, names);
    }
}

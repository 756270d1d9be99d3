use cuesync_common::textcodec::{decode, encode};
use proptest::collection::vec;
use proptest::prelude::*;

fn cue_char() -> impl Strategy<Value = char> {
    prop_oneof![
        (b'a'..=b'z').prop_map(char::from),
        (b'A'..=b'Z').prop_map(char::from),
        (b'0'..=b'9').prop_map(char::from),
        Just(' '),
        Just('\n'),
        Just('&'),
        Just('<'),
        Just('>'),
        Just('"'),
        Just('\''),
        Just('.'),
        Just(','),
        Just('-'),
        Just('…'),
        Just('♪'),
        Just('中'),
        Just('文'),
        Just('é'),
        Just('ß'),
    ]
}

fn cue_text(max_len: usize) -> impl Strategy<Value = String> {
    vec(cue_char(), 0..max_len).prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn encode_then_decode_is_identity(text in cue_text(120)) {
        prop_assert_eq!(decode(&encode(&text)), text);
    }

    #[test]
    fn encoded_text_never_contains_raw_newlines(text in cue_text(120)) {
        prop_assert!(!encode(&text).contains('\n'));
    }
}

#[test]
fn literal_break_marker_survives_the_round_trip() {
    let tricky = "before <br /> after\n&lt;already escaped&gt;";
    assert_eq!(decode(&encode(tricky)), tricky);
}

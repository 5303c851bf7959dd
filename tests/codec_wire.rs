use HoldLedger::{
    decode, decode_strict, decode_with, encode, DecodeMode, ErrorKind, HolderRecord, Interval,
};

#[test]
fn encode_matches_wire_format() {
    let rec = HolderRecord::from_parts(
        "alice",
        vec![Interval::closed(5, 12), Interval::closed(12, 30), Interval::open(40)],
    )
    .unwrap();
    let bytes = encode(&rec);
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        r#"{"Holder":"alice","Times":[["5","12"],["12","30"],["40",""]]}"#
    );

    let empty = HolderRecord::new("nobody");
    assert_eq!(encode(&empty), br#"{"Holder":"nobody","Times":[]}"#.to_vec());
}

#[test]
fn round_trip_preserves_records() {
    let samples = vec![
        HolderRecord::new("a"),
        HolderRecord::opened_at("b", 0),
        HolderRecord::opened_at("neg", -42),
        HolderRecord::from_parts("c", vec![Interval::closed(1, 2)]).unwrap(),
        HolderRecord::from_parts(
            "unicode-ключ",
            vec![Interval::closed(i64::MIN, 0), Interval::open(i64::MAX)],
        )
        .unwrap(),
    ];
    for r in samples {
        let bytes = encode(&r);
        assert_eq!(decode(&bytes), r);
        assert_eq!(decode_strict(&bytes).unwrap(), r);
    }
}

#[test]
fn lenient_decode_yields_empty_record_on_malformed_input() {
    let malformed: Vec<&[u8]> = vec![
        b"",
        b"not json",
        b"[1,2,3]",
        br#"{"Holder":"x","Times":"nope"}"#,
        br#"{"Holder":"x","Times":[["1"]]}"#,
        br#"{"Holder":"x","Times":[["1","2","3"]]}"#,
        br#"{"Holder":"x","Times":[["abc",""]]}"#,
        br#"{"Holder":"x","Times":[["1","soon"]]}"#,
        br#"{"Holder":"x","Times":[[1,2]]}"#,
    ];
    for m in malformed {
        let rec = decode(m);
        assert_eq!(rec, HolderRecord::default(), "input {:?}", String::from_utf8_lossy(m));
        assert!(rec.is_empty());

        let err = decode_strict(m).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }
}

#[test]
fn decode_accepts_lowercase_names_missing_fields_and_null_times() {
    let rec = decode(br#"{"holder":"bob","times":[["8",""]]}"#);
    assert_eq!(rec, HolderRecord::opened_at("bob", 8));

    let rec = decode(br#"{"Holder":"bob","Times":null,"Extra":1}"#);
    assert_eq!(rec.holder(), "bob");
    assert!(rec.history().is_empty());

    let rec = decode(br#"{"Times":[["3","4"]]}"#);
    assert_eq!(rec.holder(), "");
    assert_eq!(rec.history(), &[Interval::closed(3, 4)]);
}

#[test]
fn strict_decode_checks_open_close_invariants() {
    // открытый интервал не в конце - лениво читается как есть, строго - ошибка
    let bytes = br#"{"Holder":"x","Times":[["1",""],["2","3"]]}"#;
    let lenient = decode_with(bytes, DecodeMode::Lenient).unwrap();
    assert_eq!(lenient.history().len(), 2);

    let err = decode_with(bytes, DecodeMode::Strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert!(err.to_string().starts_with("decode failure:"));
}

#[test]
fn field_names_match_case_insensitively() {
    let rec = decode(br#"{"HOLDER":"alice","TIMES":[["5","12"],["20",""]]}"#);
    assert_eq!(rec.holder(), "alice");
    assert_eq!(rec.history(), &[Interval::closed(5, 12), Interval::open(20)]);

    let rec = decode_strict(br#"{"hOlDeR":"bob","tImEs":[["8",""]]}"#).unwrap();
    assert_eq!(rec, HolderRecord::opened_at("bob", 8));
}

#[test]
fn last_spelling_of_a_field_wins() {
    // разные написания одного поля: побеждает последнее по документу
    let rec = decode(br#"{"holder":"x","Holder":"y","times":[["1",""]],"Times":[["2","3"]]}"#);
    assert_eq!(rec.holder(), "y");
    assert_eq!(rec.history(), &[Interval::closed(2, 3)]);

    let rec = decode(br#"{"Holder":"y","holder":"x","Times":[["2","3"]],"TIMES":[["1",""]]}"#);
    assert_eq!(rec.holder(), "x");
    assert_eq!(rec.history(), &[Interval::open(1)]);

    // поздний null обнуляет Times, но не Holder
    let rec = decode(br#"{"Holder":"z","Times":[["4",""]],"times":null,"holder":null}"#);
    assert_eq!(rec.holder(), "z");
    assert!(rec.history().is_empty());

    // неправильный тип у любого написания - ошибка разбора
    let err = decode_strict(br#"{"Holder":"z","HOLDER":7}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

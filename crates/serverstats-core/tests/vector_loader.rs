//! Fixture loading and exposition parsing shared by the core tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::fs;

use serverstats_core::snapshot::{decode_snapshot, ServerSnapshot};

pub fn load_bytes(name: &str) -> Vec<u8> {
    fs::read(format!("tests/vectors/{name}")).unwrap()
}

pub fn load_snapshot(name: &str) -> ServerSnapshot {
    decode_snapshot(&load_bytes(name)).expect("fixture must decode")
}

/// One parsed sample: (name, labels in order, value as written).
pub type Sample = (String, Vec<(String, String)>, String);

/// Minimal exposition parser: skips comments, unescapes label values.
pub fn parse_exposition(body: &str) -> Vec<Sample> {
    body.lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .map(parse_sample)
        .collect()
}

fn parse_sample(line: &str) -> Sample {
    let (series, value) = line.rsplit_once(' ').expect("sample without value");
    let Some((name, rest)) = series.split_once('{') else {
        return (series.to_string(), Vec::new(), value.to_string());
    };
    let body = rest.strip_suffix('}').expect("unterminated label block");

    let mut labels = Vec::new();
    let mut chars = body.chars().peekable();
    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        assert_eq!(chars.next(), Some('"'), "label value must be quoted");
        let mut val = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => val.push('\n'),
                    Some(other) => val.push(other),
                    None => panic!("dangling escape"),
                },
                '"' => break,
                c => val.push(c),
            }
        }
        labels.push((key, val));
        if chars.peek() == Some(&',') {
            chars.next();
        }
    }
    (name.to_string(), labels, value.to_string())
}

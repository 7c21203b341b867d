use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use phrase_count::extract::CHUNK_SIZE;
use phrase_count::{
    find_top_phrases, find_top_phrases_with, fingerprint, SearchConfig, SearchError, TopPhrase,
};

fn test_base(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("phrase-count-it-{}-{}", process::id(), name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_input(base: &Path, lines: &[&str]) -> PathBuf {
    let path = base.join("input.txt");
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

fn conf(base: &Path) -> SearchConfig {
    SearchConfig {
        work_dir: Some(base.to_path_buf()),
        ..SearchConfig::default()
    }
}

/// Sorts the expected (count, text) pairs the way the reducer must: count
/// descending, fingerprint ascending. Deriving the tie-break through the
/// crate's own fingerprint keeps the sample independent of digest details.
fn expected(mut phrases: Vec<(u64, &str)>) -> Vec<(u64, Vec<u8>)> {
    phrases.sort_by(|(count_a, text_a), (count_b, text_b)| {
        count_b.cmp(count_a).then_with(|| {
            fingerprint(text_a.as_bytes()).cmp(&fingerprint(text_b.as_bytes()))
        })
    });
    phrases
        .into_iter()
        .map(|(count, text)| (count, text.as_bytes().to_vec()))
        .collect()
}

fn actual(result: Vec<TopPhrase>) -> Vec<(u64, Vec<u8>)> {
    result
        .into_iter()
        .map(|phrase| (phrase.count, phrase.text.to_vec()))
        .collect()
}

const SMALL_SUBSET: &[&str] = &[
    "Foobar Candy|Olympics 2012|PGA|CNET|Microsoft Bing",
    "|X|",
    "",
    "Foobar Andy|Olympics 2014|FPGA|C# .NET|Microsoft|Xing",
    "Foobar Candy|Microsoft Bing|Olympics 2013|PGA|PGA|CNET",
];

#[test]
fn top_five_of_small_subset() {
    let base = test_base("top5");
    let input = write_input(&base, SMALL_SUBSET);

    let result = find_top_phrases_with(&input, 5, &conf(&base)).unwrap();
    assert_eq!(
        actual(result),
        expected(vec![
            (3, "PGA"),
            (3, ""),
            (2, "CNET"),
            (2, "Microsoft Bing"),
            (2, "Foobar Candy"),
        ])
    );

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn all_fourteen_of_small_subset() {
    let base = test_base("top14");
    let input = write_input(&base, SMALL_SUBSET);

    let result = find_top_phrases_with(&input, 14, &conf(&base)).unwrap();
    assert_eq!(
        actual(result),
        expected(vec![
            (3, "PGA"),
            (3, ""),
            (2, "CNET"),
            (2, "Microsoft Bing"),
            (2, "Foobar Candy"),
            (1, "Olympics 2012"),
            (1, "X"),
            (1, "Foobar Andy"),
            (1, "Olympics 2014"),
            (1, "FPGA"),
            (1, "C# .NET"),
            (1, "Microsoft"),
            (1, "Xing"),
            (1, "Olympics 2013"),
        ])
    );

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn single_line_counts_every_phrase_once() {
    let base = test_base("one-line");
    let input = write_input(&base, &["|hello there|a b c"]);

    let result = find_top_phrases_with(&input, 3, &conf(&base)).unwrap();
    assert_eq!(
        actual(result),
        expected(vec![(1, ""), (1, "hello there"), (1, "a b c")])
    );

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn repeated_lines_accumulate_counts() {
    let base = test_base("three-lines");
    let line = "|hello there|a b c";
    let input = write_input(&base, &[line, line, line]);

    let result = find_top_phrases_with(&input, 3, &conf(&base)).unwrap();
    assert_eq!(
        actual(result),
        expected(vec![(3, ""), (3, "hello there"), (3, "a b c")])
    );

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn single_winner_among_noise() {
    let base = test_base("one-winner");
    let input = write_input(
        &base,
        &[
            "This is a long long line|Hello, world!",
            "a String|This is sane phrase!|a String|Abc defghij klmnopq|\
             One of those top phrases. (Одна из тех осмысленных фраз)|p9 p10 p11|",
        ],
    );

    let result = find_top_phrases_with(&input, 1, &conf(&base)).unwrap();
    assert_eq!(actual(result), expected(vec![(2, "a String")]));

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn zero_limit_yields_empty_result_without_error() {
    let base = test_base("zero");
    let input = write_input(&base, &["a|b|c"]);

    let result = find_top_phrases_with(&input, 0, &conf(&base)).unwrap();
    assert!(result.is_empty());

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn limit_beyond_distinct_count_returns_everything() {
    let base = test_base("oversized-limit");
    let input = write_input(&base, &["a|b|a"]);

    let result = find_top_phrases_with(&input, 100, &conf(&base)).unwrap();
    assert_eq!(actual(result), expected(vec![(2, "a"), (1, "b")]));

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn phrase_longer_than_the_read_chunk_round_trips() {
    let base = test_base("long-phrase");
    let long: String = "x".repeat(2 * CHUNK_SIZE + 17);
    let input = write_input(&base, &[&long, &long, "tail"]);

    let result = find_top_phrases_with(&input, 1, &conf(&base)).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].count, 2);
    assert_eq!(&result[0].text[..], long.as_bytes());

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn working_area_is_released_after_the_run() {
    let base = test_base("cleanup");
    let input = write_input(&base, &["a|b|a"]);

    find_top_phrases_with(&input, 2, &conf(&base)).unwrap();

    for entry in fs::read_dir(&base).unwrap() {
        let name = entry.unwrap().file_name();
        assert_eq!(name, "input.txt", "leftover working area: {:?}", name);
    }

    fs::remove_dir_all(&base).unwrap();
}

#[test]
fn unreadable_source_is_an_invalid_argument() {
    let missing = env::temp_dir().join("phrase-count-it-no-such-input.txt");
    let err = find_top_phrases(&missing, 5).unwrap_err();
    match err {
        SearchError::InvalidArgument(msg) => {
            assert!(msg.contains("can't open source"), "message: {}", msg)
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

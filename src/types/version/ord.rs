use super::DebVersion;
use std::cmp::Ordering;

/// One run of a version string.
///
/// Numbers keep their digits (leading zeros trimmed) so that arbitrarily long
/// runs still compare by magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionToken<'a> {
    Alphabetic(&'a str),
    Number(&'a str),
}

impl Ord for VersionToken<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        use VersionToken::*;
        match (self, other) {
            (Number(a), Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Alphabetic(a), Alphabetic(b)) => a.cmp(b),
            (Alphabetic(_), Number(_)) => Ordering::Less,
            (Number(_), Alphabetic(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for VersionToken<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split into maximal digit runs and letter runs. Anything else is a separator.
///
/// `~` is an ordinary separator here, so `1.0~beta` sorts *above* `1.0`.
pub fn tokenize(s: &str) -> Vec<VersionToken<'_>> {
    let mut res = Vec::new();
    let bytes = s.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_digit() || c.is_ascii_alphabetic() {
            let digit = c.is_ascii_digit();
            let start = pos;
            while pos < bytes.len()
                && (bytes[pos].is_ascii_digit() == digit)
                && (bytes[pos].is_ascii_digit() || bytes[pos].is_ascii_alphabetic())
            {
                pos += 1;
            }
            let run = &s[start..pos];
            if digit {
                let trimmed = run.trim_start_matches('0');
                res.push(VersionToken::Number(trimmed));
            } else {
                res.push(VersionToken::Alphabetic(run));
            }
        } else {
            pos += 1;
        }
    }
    res
}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| tokenize(&self.upstream).cmp(&tokenize(&other.upstream)))
            .then_with(|| tokenize(&self.revision).cmp(&tokenize(&other.revision)))
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DebVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DebVersion {}

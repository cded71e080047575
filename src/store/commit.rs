//! Commit object parsing: `tree <hex>\n(parent <hex>\n)*author ...\n
//! committer ...\n\n<message>`.
//!
//! Rewritten against nom 7's combinator style and `chrono`'s non-panicking
//! `_opt` constructors; the teacher's version used the pre-1.0
//! `named!`/`chain!` macros and `try!`, and hard-panicked via `unwrap()`
//! on both.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use nom::branch::alt;
use nom::bytes::complete::{tag, take};
use nom::character::complete::{char, digit1, line_ending};
use nom::multi::many0;
use nom::IResult;

use crate::error::{Error, Result};
use crate::hash::Sha;

#[derive(Debug, Clone)]
pub struct Person {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl Display for Person {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Author: {} <{}>", self.name, self.email)?;
        writeln!(f, "Date:   {}", self.timestamp.format("%a %b %-e %T %Y %z"))
    }
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub tree: Sha,
    pub parents: Vec<Sha>,
    pub author: Person,
    pub committer: Person,
    pub message: String,
}

impl Display for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.author)?;
        for line in self.message.split('\n') {
            writeln!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

impl Commit {
    pub fn parse(content: &[u8]) -> Result<Self> {
        let (_, (tree, parents, author, committer, message)) = parse_commit(content)
            .map_err(|_| Error::BadPackFile("malformed commit object".into()))?;

        let tree = Sha::from_hex(tree).map_err(|e| Error::BadPackFile(format!("commit tree id: {e}")))?;
        let parents = parents
            .into_iter()
            .map(Sha::from_hex)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::BadPackFile(format!("commit parent id: {e}")))?;
        let message = String::from_utf8(message.to_vec())
            .map_err(|_| Error::BadPackFile("commit message is not utf8".into()))?;

        Ok(Commit {
            tree,
            parents,
            author,
            committer,
            message,
        })
    }
}

fn parse_hex_id(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take(40usize)(input)
}

fn parse_parent(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag("parent ")(input)?;
    let (input, parent) = parse_hex_id(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, parent))
}

fn parse_person(input: &[u8]) -> IResult<&[u8], Person> {
    use nom::bytes::complete::take_until;

    let (input, name) = take_until(" <")(input)?;
    let (input, _) = tag(" <")(input)?;
    let (input, email) = take_until("> ")(input)?;
    let (input, _) = tag("> ")(input)?;
    let (input, ts) = digit1(input)?;
    let (input, _) = char(' ')(input)?;
    let (input, sign) = alt((char('+'), char('-')))(input)?;
    let (input, tz) = digit1(input)?;
    let (input, _) = line_ending(input)?;

    let name = String::from_utf8_lossy(name).into_owned();
    let email = String::from_utf8_lossy(email).into_owned();
    // Safe: digit1 only yields ASCII digit bytes.
    let ts: i64 = std::str::from_utf8(ts).unwrap().parse().unwrap_or(0);
    let tz: i32 = std::str::from_utf8(tz).unwrap().parse().unwrap_or(0);
    let sign = if sign == '-' { -1 } else { 1 };

    let naive = NaiveDateTime::from_timestamp_opt(ts, 0).unwrap_or_default();
    let offset = FixedOffset::east_opt(sign * (tz / 100) * 3600).unwrap_or(FixedOffset::east_opt(0).unwrap());
    let timestamp = offset.from_utc_datetime(&naive);

    Ok((
        input,
        Person {
            name,
            email,
            timestamp,
        },
    ))
}

type RawCommit<'a> = (&'a [u8], Vec<&'a [u8]>, Person, Person, &'a [u8]);

fn parse_commit(input: &[u8]) -> IResult<&[u8], RawCommit<'_>> {
    let (input, _) = tag("tree ")(input)?;
    let (input, tree) = parse_hex_id(input)?;
    let (input, _) = line_ending(input)?;
    let (input, parents) = many0(parse_parent)(input)?;
    let (input, _) = tag("author ")(input)?;
    let (input, author) = parse_person(input)?;
    let (input, _) = tag("committer ")(input)?;
    let (input, committer) = parse_person(input)?;
    let (input, _) = line_ending(input)?;
    Ok((&input[input.len()..], (tree, parents, author, committer, input)))
}

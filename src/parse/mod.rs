// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

pub mod entity;

use cgmath::Vector3;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::space0,
    multi::many0,
    sequence::{delimited, preceded},
};

pub use self::entity::entity_pairs;

fn string_contents(input: &str) -> nom::IResult<&str, &str> {
    take_while(|c: char| c != '"' && c != '\n' && c != '\r')(input)
}

/// Parses a double-quoted string, which may be empty.
pub fn quoted(input: &str) -> nom::IResult<&str, &str> {
    delimited(tag("\""), string_contents, tag("\""))(input)
}

pub fn brace(input: &str) -> nom::IResult<&str, &str> {
    alt((tag("{"), tag("}")))(input)
}

fn bare_word(input: &str) -> nom::IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '{' && c != '}' && c != '"')(input)
}

/// Parses one script token: a brace, a quoted string (without its quotes) or a bare word.
pub fn token(input: &str) -> nom::IResult<&str, &str> {
    alt((brace, quoted, bare_word))(input)
}

/// Removes a trailing `//` comment from a line.
pub fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Splits one line of script text into tokens, ignoring any `//` comment.
pub fn line_tokens(line: &str) -> Vec<&str> {
    let line = strip_comment(line);
    match many0(preceded(space0, token))(line) {
        Ok((_, tokens)) => tokens,
        Err(_) => Vec::new(),
    }
}

pub fn vector3_components<S>(src: S) -> Option<[f32; 3]>
where
    S: AsRef<str>,
{
    let src = src.as_ref();

    let components: Vec<_> = src.split_whitespace().collect();
    if components.len() != 3 {
        return None;
    }

    let x: f32 = match components[0].parse().ok() {
        Some(p) => p,
        None => return None,
    };

    let y: f32 = match components[1].parse().ok() {
        Some(p) => p,
        None => return None,
    };

    let z: f32 = match components[2].parse().ok() {
        Some(p) => p,
        None => return None,
    };

    Some([x, y, z])
}

pub fn vector3<S>(src: S) -> Option<Vector3<f32>>
where
    S: AsRef<str>,
{
    vector3_components(src).map(Vector3::from)
}

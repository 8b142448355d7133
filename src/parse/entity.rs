// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::parse::quoted;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded},
};

fn bare_value(input: &str) -> nom::IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '"')(input)
}

fn value(input: &str) -> nom::IResult<&str, &str> {
    preceded(multispace0, alt((quoted, bare_value)))(input)
}

// "name" "value"
pub fn entity_attribute(input: &str) -> nom::IResult<&str, (&str, &str)> {
    pair(value, value)(input)
}

/// Parses the body of one entity into its key/value pairs, in file order.
///
/// A trailing key with no value is dropped.
pub fn entity_pairs(body: &str) -> Vec<(&str, &str)> {
    match many0(entity_attribute)(body) {
        Ok((_, pairs)) => pairs,
        Err(_) => Vec::new(),
    }
}

// anything but a brace
fn block_text(input: &str) -> nom::IResult<&str, &str> {
    take_while1(|c: char| c != '{' && c != '}')(input)
}

/// Parses one balanced `{ ... }` block, returning the text strictly between its outer braces.
pub fn entity_block(input: &str) -> nom::IResult<&str, &str> {
    delimited(
        char('{'),
        recognize(many0(alt((block_text, recognize(entity_block))))),
        char('}'),
    )(input)
}

// text between blocks, including stray closing braces
fn between_blocks(input: &str) -> nom::IResult<&str, &str> {
    take_while1(|c: char| c != '{')(input)
}

/// Splits the text of the entities lump into the bodies of its top-level `{ ... }` blocks.
///
/// Text outside the blocks is skipped. Parsing stops at the first block that is never closed.
pub fn entity_bodies(text: &str) -> Vec<&str> {
    let item = alt((map(entity_block, Some), map(between_blocks, |_| None)));
    match many0(item)(text) {
        Ok((_, bodies)) => bodies.into_iter().flatten().collect(),
        Err(_) => Vec::new(),
    }
}

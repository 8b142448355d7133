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

use std::fmt::{self, Display};

use crate::{bsp::lump::LumpId, mesh::MeshError};

use failure::{Backtrace, Context, Fail};

#[derive(Debug)]
pub struct BspError {
    inner: Context<BspErrorKind>,
}

impl BspError {
    pub fn kind(&self) -> &BspErrorKind {
        self.inner.get_context()
    }
}

impl From<BspErrorKind> for BspError {
    fn from(kind: BspErrorKind) -> Self {
        BspError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<BspErrorKind>> for BspError {
    fn from(inner: Context<BspErrorKind>) -> Self {
        BspError { inner }
    }
}

impl From<MeshError> for BspError {
    fn from(e: MeshError) -> Self {
        let kind = match e {
            MeshError::CapacityExceeded { ref section, .. } => BspErrorKind::CapacityExceeded {
                section: section.clone(),
            },
        };

        BspError {
            inner: e.context(kind),
        }
    }
}

impl Fail for BspError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for BspError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum BspErrorKind {
    #[fail(display = "Corrupt header: {}", reason)]
    CorruptHeader { reason: String },
    #[fail(display = "Malformed {:?} lump: {}", lump, reason)]
    MalformedLump { lump: LumpId, reason: String },
    #[fail(
        display = "{:?} lump ends at byte {} but the file is {} bytes long",
        lump, end, len
    )]
    LumpOutOfBounds { lump: LumpId, end: usize, len: usize },
    #[fail(display = "Malformed face {}: {}", face, reason)]
    MalformedFace { face: usize, reason: String },
    #[fail(display = "Section {} exceeded the vertex capacity", section)]
    CapacityExceeded { section: String },
    #[fail(display = "No such leaf: {}", leaf)]
    NoSuchLeaf { leaf: usize },
    #[fail(display = "No such face: {}", face)]
    NoSuchFace { face: usize },
    #[fail(display = "Node {} is reachable more than once", node)]
    CyclicTree { node: usize },
}

impl BspErrorKind {
    pub(crate) fn corrupt_header<S>(reason: S) -> BspErrorKind
    where
        S: AsRef<str>,
    {
        BspErrorKind::CorruptHeader {
            reason: reason.as_ref().to_owned(),
        }
    }

    pub(crate) fn malformed_lump<S>(lump: LumpId, reason: S) -> BspErrorKind
    where
        S: AsRef<str>,
    {
        BspErrorKind::MalformedLump {
            lump,
            reason: reason.as_ref().to_owned(),
        }
    }

    pub(crate) fn malformed_face<S>(face: usize, reason: S) -> BspErrorKind
    where
        S: AsRef<str>,
    {
        BspErrorKind::MalformedFace {
            face,
            reason: reason.as_ref().to_owned(),
        }
    }
}

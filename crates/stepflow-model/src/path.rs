//! Step paths for addressing within a step forest
//!
//! Provides [`StepPath`] and the copy-on-write helpers that read or rewrite
//! the step at a path ([`get_deep_value`], [`set_deep_value`],
//! [`insert_deep_value`], [`remove_deep_value`]).

use crate::step::{Step, StepSequence};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

const STEPS_KEY: &str = "steps";
const BRANCHES_KEY: &str = "branches";

/// One hop of a step path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Index into a step sequence
    Step(usize),
    /// Index into a step's branch list
    Branch(usize),
}

/// Path to a step within the forest
///
/// Always alternates `Step, Branch, Step, ...` and ends on a `Step`.
///
/// # Examples
/// - `steps.2` → third top-level step
/// - `steps.2.branches.0.steps.1` → second step of the first branch of it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepPath(Vec<PathSegment>);

impl StepPath {
    /// Path to a top-level step
    #[inline]
    #[must_use]
    pub fn top_level(index: usize) -> Self {
        Self(vec![PathSegment::Step(index)])
    }

    /// Build from segments
    ///
    /// # Errors
    /// Returns error if segments do not alternate starting and ending on a step
    pub fn from_segments(segments: Vec<PathSegment>) -> Result<Self, PathError> {
        validate_segments(&segments)?;
        Ok(Self(segments))
    }

    /// Parse token form, e.g. `["steps", "2", "branches", "0", "steps", "1"]`
    ///
    /// The leading `steps` key is optional.
    ///
    /// # Errors
    /// Returns error on empty input, unknown keys, non-numeric indices or
    /// a key without an index.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, PathError> {
        if tokens.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::with_capacity(tokens.len() / 2 + 1);
        let mut iter = tokens.iter().map(AsRef::as_ref).peekable();

        // bare leading index addresses the root sequence
        if let Some(first) = iter.peek() {
            if first.parse::<usize>().is_ok() {
                let index = parse_index(iter.next().unwrap_or_default())?;
                segments.push(PathSegment::Step(index));
            }
        }

        while let Some(key) = iter.next() {
            let index = match iter.next() {
                Some(raw) => parse_index(raw)?,
                None => return Err(PathError::DanglingKey(key.to_string())),
            };
            match key {
                STEPS_KEY => segments.push(PathSegment::Step(index)),
                BRANCHES_KEY => segments.push(PathSegment::Branch(index)),
                other => return Err(PathError::InvalidSegment(other.to_string())),
            }
        }

        Self::from_segments(segments)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated path
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nesting depth (0 for top-level steps)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len() / 2
    }

    /// Whether this addresses a top-level step
    #[inline]
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// Index of the top-level ancestor (or self)
    #[inline]
    #[must_use]
    pub fn root_index(&self) -> usize {
        match self.0.first() {
            Some(PathSegment::Step(i)) => *i,
            _ => 0,
        }
    }

    /// Index of the addressed step within its sequence
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        match self.0.last() {
            Some(PathSegment::Step(i)) => *i,
            _ => 0,
        }
    }

    /// Branch index of the containing branch (`None` at top level)
    #[inline]
    #[must_use]
    pub fn branch_index(&self) -> Option<usize> {
        match self.0.len().checked_sub(2).and_then(|i| self.0.get(i)) {
            Some(PathSegment::Branch(b)) => Some(*b),
            _ => None,
        }
    }

    /// Path of the fan-out step owning this step's branch
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_top_level() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 2].to_vec()))
        }
    }

    /// Path to step `position` of branch `branch` of this step
    #[inline]
    #[must_use]
    pub fn child(&self, branch: usize, position: usize) -> Self {
        let mut new = self.clone();
        new.0.push(PathSegment::Branch(branch));
        new.0.push(PathSegment::Step(position));
        new
    }

    /// Sibling path at another position in the same sequence
    #[inline]
    #[must_use]
    pub fn with_position(&self, position: usize) -> Self {
        let mut new = self.clone();
        if let Some(last) = new.0.last_mut() {
            *last = PathSegment::Step(position);
        }
        new
    }

    /// Check if this path is an ancestor of another (strict prefix)
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Token form, inverse of [`StepPath::from_tokens`]
    #[must_use]
    pub fn to_tokens(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|seg| match seg {
                PathSegment::Step(i) => [STEPS_KEY.to_string(), i.to_string()],
                PathSegment::Branch(i) => [BRANCHES_KEY.to_string(), i.to_string()],
            })
            .collect()
    }
}

impl Display for StepPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tokens().join("."))
    }
}

impl FromStr for StepPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let tokens: Vec<&str> = s.split('.').collect();
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(PathError::EmptySegment);
        }
        Self::from_tokens(&tokens)
    }
}

impl serde::Serialize for StepPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for StepPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_index(raw: &str) -> Result<usize, PathError> {
    raw.parse()
        .map_err(|_| PathError::InvalidIndex(raw.to_string()))
}

fn validate_segments(segments: &[PathSegment]) -> Result<(), PathError> {
    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    for (i, seg) in segments.iter().enumerate() {
        let expect_step = i % 2 == 0;
        match (expect_step, seg) {
            (true, PathSegment::Step(_)) | (false, PathSegment::Branch(_)) => {}
            _ => return Err(PathError::Misaligned { position: i }),
        }
    }
    if segments.len() % 2 == 0 {
        return Err(PathError::EndsOnBranch);
    }
    Ok(())
}

/// Step at `path`
///
/// # Errors
/// Returns error if any index along the path is out of range
pub fn get_deep_value<'a>(root: &'a StepSequence, path: &StepPath) -> Result<&'a Step, PathError> {
    let mut sequence = root;
    let mut segments = path.segments().iter();
    loop {
        let Some(PathSegment::Step(index)) = segments.next() else {
            return Err(PathError::Empty);
        };
        let step = sequence.get(*index).ok_or_else(|| PathError::OutOfRange {
            path: path.to_string(),
            index: *index,
            len: sequence.len(),
        })?;
        match segments.next() {
            None => return Ok(step),
            Some(PathSegment::Branch(b)) => {
                let branch = step
                    .branches
                    .as_ref()
                    .and_then(|branches| branches.get(*b))
                    .ok_or_else(|| PathError::MissingBranch {
                        path: path.to_string(),
                        branch: *b,
                    })?;
                sequence = &branch.steps;
            }
            Some(PathSegment::Step(_)) => {
                return Err(PathError::Misaligned { position: 0 });
            }
        }
    }
}

/// Replace the step at `path`, returning the new forest
///
/// Only the containers along the path are copied; the input is untouched.
///
/// # Errors
/// Returns error if any index along the path is out of range
pub fn set_deep_value(
    root: &StepSequence,
    path: &StepPath,
    value: Step,
) -> Result<StepSequence, PathError> {
    edit_sequence(root, path, |sequence, index| {
        if index >= sequence.len() {
            return Err(out_of_range(path, index, sequence.len()));
        }
        sequence.set(index, value);
        Ok(())
    })
}

/// Insert a step before the position addressed by `path`
///
/// The final position may equal the sequence length (append).
///
/// # Errors
/// Returns error if any index along the path is out of range
pub fn insert_deep_value(
    root: &StepSequence,
    path: &StepPath,
    value: Step,
) -> Result<StepSequence, PathError> {
    edit_sequence(root, path, |sequence, index| {
        if index > sequence.len() {
            return Err(out_of_range(path, index, sequence.len()));
        }
        sequence.insert(index, value);
        Ok(())
    })
}

/// Remove the step at `path`, returning the new forest
///
/// # Errors
/// Returns error if any index along the path is out of range
pub fn remove_deep_value(root: &StepSequence, path: &StepPath) -> Result<StepSequence, PathError> {
    edit_sequence(root, path, |sequence, index| {
        if index >= sequence.len() {
            return Err(out_of_range(path, index, sequence.len()));
        }
        sequence.remove(index);
        Ok(())
    })
}

fn out_of_range(path: &StepPath, index: usize, len: usize) -> PathError {
    PathError::OutOfRange {
        path: path.to_string(),
        index,
        len,
    }
}

/// Apply `edit` to the sequence containing the addressed step, copying
/// every ancestor on the way back up.
fn edit_sequence<F>(root: &StepSequence, path: &StepPath, edit: F) -> Result<StepSequence, PathError>
where
    F: FnOnce(&mut StepSequence, usize) -> Result<(), PathError>,
{
    fn descend<F>(
        sequence: &StepSequence,
        segments: &[PathSegment],
        path: &StepPath,
        edit: F,
    ) -> Result<StepSequence, PathError>
    where
        F: FnOnce(&mut StepSequence, usize) -> Result<(), PathError>,
    {
        match segments {
            [PathSegment::Step(index)] => {
                let mut copy = sequence.clone();
                edit(&mut copy, *index)?;
                Ok(copy)
            }
            [PathSegment::Step(index), PathSegment::Branch(b), rest @ ..] if !rest.is_empty() => {
                let step = sequence
                    .get(*index)
                    .ok_or_else(|| out_of_range(path, *index, sequence.len()))?;
                let branches = step.branches.as_ref().ok_or_else(|| PathError::MissingBranch {
                    path: path.to_string(),
                    branch: *b,
                })?;
                let branch = branches.get(*b).ok_or_else(|| PathError::MissingBranch {
                    path: path.to_string(),
                    branch: *b,
                })?;

                let new_steps = descend(&branch.steps, rest, path, edit)?;

                let mut new_branch = branch.clone();
                new_branch.steps = new_steps;
                let mut new_branches = branches.clone();
                new_branches.set(*b, new_branch);
                let mut new_step = step.clone();
                new_step.branches = Some(new_branches);

                let mut copy = sequence.clone();
                copy.set(*index, new_step);
                Ok(copy)
            }
            _ => Err(PathError::EndsOnBranch),
        }
    }

    descend(root, path.segments(), path, edit)
}

/// Errors related to step paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No segments
    #[error("path is empty")]
    Empty,

    /// Empty segment in dotted form
    #[error("path contains empty segment")]
    EmptySegment,

    /// Unknown key
    #[error("invalid segment: {0} (expected `steps` or `branches`)")]
    InvalidSegment(String),

    /// Index is not a number
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// Key without following index
    #[error("key '{0}' is not followed by an index")]
    DanglingKey(String),

    /// Segments do not alternate step/branch
    #[error("segment {position} breaks step/branch alternation")]
    Misaligned { position: usize },

    /// Path addresses a branch, not a step
    #[error("path ends on a branch instead of a step")]
    EndsOnBranch,

    /// Index past the end of its sequence
    #[error("index {index} out of range (len {len}) in path '{path}'")]
    OutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// Step has no such branch
    #[error("branch {branch} does not exist in path '{path}'")]
    MissingBranch { path: String, branch: usize },
}

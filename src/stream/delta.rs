//! Normalized per-chunk deltas and the parser interface that produces them.

/// One normalized unit of streamed information extracted from one chunk.
///
/// A delta only ever carries partial information; absent fields mean
/// "nothing new", never "cleared".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub text_fragment: Option<String>,
    /// Tool-call pieces in chunk order. Parallel calls can share a chunk.
    pub tool_call_fragments: Vec<ToolCallFragment>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub response_id: Option<String>,
    pub response_model: Option<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        *self == Delta::default()
    }

    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            text_fragment: Some(fragment.into()),
            ..Self::default()
        }
    }
}

/// A piece of one tool call. `id`/`name` arrive on the fragment that opens
/// the slot; later fragments for the same `index` carry argument text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_fragment: Option<String>,
}

impl ToolCallFragment {
    /// Fragment opening a new slot.
    pub fn open(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments_fragment: None,
        }
    }

    /// Fragment appending argument text to an existing slot.
    pub fn arguments(index: u32, fragment: impl Into<String>) -> Self {
        Self {
            index,
            arguments_fragment: Some(fragment.into()),
            ..Self::default()
        }
    }

    pub fn with_arguments(mut self, fragment: impl Into<String>) -> Self {
        self.arguments_fragment = Some(fragment.into());
        self
    }
}

/// Token usage as reported by the provider.
///
/// Some providers report the two counts on different chunks, so each is
/// optional and only a present count overwrites the accumulated one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
        }
    }
}

/// Converts one provider chunk into a [`Delta`].
///
/// Parsing is pure and infallible: a chunk of unexpected shape yields an
/// empty delta rather than failing the stream.
pub trait DeltaParser<T: ?Sized> {
    fn parse(&self, chunk: &T) -> Delta;
}

impl<T: ?Sized, F> DeltaParser<T> for F
where
    F: Fn(&T) -> Delta,
{
    fn parse(&self, chunk: &T) -> Delta {
        self(chunk)
    }
}

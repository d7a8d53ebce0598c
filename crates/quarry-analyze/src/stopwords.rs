//! Question-word and filler stripping applied before analysis.

use once_cell::sync::Lazy;
use regex::Regex;

static CJK_FILLERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "是*(什么样的|哪家|一下|那家|请问|啥样|咋样了|什么时候|何时|何地|何人|是否|是不是|\
         多少|哪里|怎么|哪儿|怎么样|如何|哪些|是啥|啥是|啊|吗|呢|吧|咋|什么|有没有|呀|谁|\
         哪位|哪个)是*",
    )
    .unwrap()
});

static EN_QUESTION_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^| )(what|who|how|which|where|why)('re|'s)? ").unwrap());

static EN_FILLERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "(^| )('s|'re|is|are|were|was|do|does|did|don't|doesn't|didn't|has|have|be|there|\
         you|me|your|my|mine|just|please|may|i|should|would|wouldn't|will|won't|done|go|\
         for|with|so|the|a|an|by|i'm|it's|he's|she's|they|they're|you're|as|by|on|in|at|\
         up|out|down|of|to|or|and|if) ",
    )
    .unwrap()
});

/// Strip interrogative particles and cheap filler words.
///
/// Matching is anchored on surrounding spaces and case-sensitive; callers on
/// the query path lowercase first.
pub fn strip_stopwords(text: &str) -> String {
    let t = CJK_FILLERS.replace_all(text, "");
    let t = EN_QUESTION_WORDS.replace_all(&t, " ");
    let t = EN_FILLERS.replace_all(&t, " ");
    t.into_owned()
}

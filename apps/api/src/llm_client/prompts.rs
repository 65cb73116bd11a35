// Prompt text for grounded question answering.
// The SOURCES convention here is what `qa::answer` parses on the way back.

/// Task framing sent as the system message of every QA request.
pub const QA_SYSTEM: &str = "\
Create a final answer to the given questions using the provided document excerpts \
(in no particular order) as references. \
ALWAYS include a \"SOURCES\" section in your answer including only the minimal set of \
sources needed to answer the question. \
If you are unable to answer the question, simply state that you do not know. \
Do not attempt to fabricate an answer and leave the SOURCES section empty.";

/// Builds the user message: reference text first, then the question.
pub fn build_user_message(docs: &str, question: &str) -> String {
    format!("## document\n{docs}\n## question\n{question}")
}

//! The hook-analysis prompt contract.

use std::fmt::Write;

use leaf_core::sampler::Frame;

/// Render the analyst prompt for exactly the frames being sent.
///
/// Every frame is listed with its index and capture time so the model can
/// answer with both, and the JSON schema spells out the valid index range.
pub fn hook_prompt(frames: &[Frame]) -> String {
    let last = frames.len().saturating_sub(1);
    let mut prompt = String::from("You are an expert social media content analyst.\n\n");

    let _ = writeln!(
        prompt,
        "I'm showing you {} frame{} from the opening of a short video, in order:",
        frames.len(),
        if frames.len() == 1 { "" } else { "s" }
    );
    for (i, frame) in frames.iter().enumerate() {
        let _ = writeln!(prompt, "- Frame {i} ({:.1}s)", frame.timestamp_secs);
    }

    let _ = write!(
        prompt,
        "\nWhich frame stops scrolling MOST and why?\n\n\
         Respond ONLY with JSON:\n\
         {{\n    \
             \"frame_index\": <integer from 0 to {last}>,\n    \
             \"timestamp_sec\": <capture time of that frame in seconds>,\n    \
             \"hook_score\": <1-100>,\n    \
             \"reason\": \"<why this frame hooks viewers>\",\n    \
             \"visual_elements\": [\"<element1>\", \"<element2>\"],\n    \
             \"improvement_tip\": \"<how to make hook stronger>\"\n\
         }}\n"
    );
    prompt
}

// Prompt constants for the semantic Scoring Oracle.

/// System prompt for match scoring — enforces JSON-only output.
pub const MATCH_SCORE_SYSTEM: &str = "You are an experienced technical recruiter. \
    Assess how well a candidate fits a job opening. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Match scoring prompt. Replace `{request_json}` with the serialized oracle request.
pub const MATCH_SCORE_PROMPT_TEMPLATE: &str = r#"Score the candidate below against the job requirements.

Input:
{request_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "overallScore": 0-100,
  "breakdown": {
    "skills": 0-100,
    "experience": 0-100,
    "location": 0-100,
    "education": 0-100
  },
  "matchedSkills": ["required skills the candidate has"],
  "missingSkills": ["required skills the candidate lacks"],
  "recommendation": "Strong Match" | "Good Match" | "Potential Match" | "Weak Match",
  "reasoning": "one or two sentences"
}

Rules:
- Every entry of jobRequirements.requiredSkills must appear in exactly one of matchedSkills or missingSkills.
- Treat obvious synonyms (e.g. "JS" and "JavaScript") as a match.
- Do not invent experience the profile does not state."#;

// Candidate/job matching: oracle-backed scoring with a deterministic fallback,
// plus bounded-concurrency ranking over many candidates or jobs.
// All LLM calls go through llm_client via the ScoringOracle seam.

pub mod handlers;
pub mod oracle;
pub mod prompts;
pub mod ranker;
pub mod scorer;

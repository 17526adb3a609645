mod concurrency;
mod directory;
mod leak;
mod resources;
mod sealing;
mod transform;

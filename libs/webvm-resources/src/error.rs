use thiserror::Error;
use webvm_reader::ReaderError;

#[derive(Error, Debug)]
pub enum ResourceError {
	#[error("resource {0} does not exist")]
	NotFound(String),
	#[error("resource {0} is not a readable file")]
	NotReadable(String),
	#[error("I/O error on {path}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("broken archive {path}")]
	Archive {
		path: String,
		#[source]
		source: zip::result::ZipError,
	},
	#[error("broken manifest in {path}")]
	Manifest {
		path: String,
		#[source]
		source: ReaderError,
	},
}

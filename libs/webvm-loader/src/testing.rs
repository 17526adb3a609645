/// `public class <internal_name> extends java/lang/Object`, nothing else.
pub(crate) fn class_file(internal_name: &str) -> Vec<u8> {
	let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 5];
	for (index, name) in [(2u8, internal_name), (4, "java/lang/Object")] {
		out.push(7);
		out.extend_from_slice(&[0, index]);
		out.push(1);
		out.extend_from_slice(&(name.len() as u16).to_be_bytes());
		out.extend_from_slice(name.as_bytes());
	}
	out.extend_from_slice(&[0x00, 0x21, 0, 1, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0]);
	out
}

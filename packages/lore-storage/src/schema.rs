pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_personas.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_personas.sql")),
				"tables/002_documents.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_documents.sql")),
				"tables/003_persona_documents.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_persona_documents.sql")),
				"tables/004_document_chunks.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_document_chunks.sql")),
				"tables/005_conversations.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_conversations.sql")),
				"tables/006_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_messages.sql")),
				"tables/007_message_citations.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_message_citations.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_are_expanded() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS personas"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS message_citations"));
	}

	#[test]
	fn personas_precede_tables_that_reference_them() {
		let sql = render_schema();
		let personas = sql.find("CREATE TABLE IF NOT EXISTS personas").expect("personas table");
		let links =
			sql.find("CREATE TABLE IF NOT EXISTS persona_documents").expect("persona_documents");

		assert!(personas < links);
	}
}

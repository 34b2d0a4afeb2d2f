use ragdb_core::QueryResult;

/// Grounded-answer prompt: text contexts separated by blank lines, then the
/// image paths the retrieval surfaced (the model only sees their names).
pub fn build_prompt(query: &str, results: &[QueryResult]) -> String {
    let context = results.iter().filter_map(|r| r.chunk.text_content()).collect::<Vec<_>>().join("\n\n");
    let images: Vec<&str> = results.iter().filter_map(|r| r.chunk.image_path()).collect();
    let images = if images.is_empty() { "None".to_string() } else { images.join(", ") };
    format!(
        "System:\n\
         You are a helpful research assistant. Answer the question based ONLY on the provided context. \
         If the context does not contain enough information, say so. Do not make up information.\n\
         \n\
         Context:\n\
         ---------\n\
         {context}\n\
         \n\
         ---------\n\
         Images Referenced (for your awareness, if any): {images}\n\
         ---------\n\
         \n\
         Question:\n\
         ---------\n\
         {query}\n\
         \n\
         Answer:"
    )
}

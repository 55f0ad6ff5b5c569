use std::sync::Arc;

use crate::resolver::ItemResolver;

/**
 * Application-specific context (state shared by handler functions)
 */
#[derive(Clone)]
pub struct Context {
    pub schema: String,
    pub resolver: Arc<dyn ItemResolver>,
}

impl Context {
    /**
     * Return a new Context.
     */
    pub fn new(schema: String, resolver: Arc<dyn ItemResolver>) -> Context {
        Context { schema, resolver }
    }
}

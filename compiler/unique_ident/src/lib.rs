/// Hands out compiler-generated names that cannot collide with each other.
///
/// One generator is owned by a single compilation, so two independent
/// compilations always start counting from zero.
#[derive(Debug, Default)]
pub struct NameGen {
    var_counter: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_temp(&mut self) -> String {
        let name = format!("tmp.{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    /// Number of temporaries handed out so far
    pub fn temps_created(&self) -> u32 {
        self.var_counter
    }
}

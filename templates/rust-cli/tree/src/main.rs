fn main() {
    println!("{{project_name}}");
}

//! Shared ownership of shapes viewed through a trait object.
//!
//! This example demonstrates:
//! * Sharing one value between several handles and watching the use count
//! * Viewing a concrete value as a trait object and back again
//! * A failed runtime-checked cast producing an empty handle

use shared_ptr::{AsAny, Shared, dynamic_pointer_cast, static_pointer_cast};

trait Shape: AsAny {
    fn describe(&self) -> String;
}

struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn describe(&self) -> String {
        format!("circle with radius {}", self.radius)
    }
}

impl Drop for Circle {
    fn drop(&mut self) {
        println!("Dropping circle with radius {}", self.radius);
    }
}

struct Square;

impl Shape for Square {
    fn describe(&self) -> String {
        "square".to_string()
    }
}

fn main() {
    println!("=== Shared Shapes Example ===");

    let circle = Shared::new(Circle { radius: 1.5 });
    println!("Created: use_count = {}", circle.use_count());

    let shape: Shared<dyn Shape> = static_pointer_cast(&circle, |c| c as &dyn Shape);
    println!(
        "Viewed as shape ({}): use_count = {}",
        shape.describe(),
        circle.use_count()
    );

    let again: Shared<Circle> = dynamic_pointer_cast(&shape);
    println!(
        "Checked back to circle (radius {}): use_count = {}",
        again.radius,
        circle.use_count()
    );

    let square: Shared<Square> = dynamic_pointer_cast(&shape);
    println!(
        "Checked as square: empty = {}, use_count = {}",
        square.is_empty(),
        square.use_count()
    );

    drop(circle);
    drop(again);
    println!("Only the shape view remains: use_count = {}", shape.use_count());

    // The circle is dropped here, through its own type.
    drop(shape);

    println!("Example completed successfully!");
}

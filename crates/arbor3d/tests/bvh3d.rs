mod bvh;
